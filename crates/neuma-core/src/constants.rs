/// neuma centralized constants.
/// Markers, limits and defaults shared by the pipeline stages.

// ─── Directives ───────────────────────────────────────────────────────────────

pub mod directives {
    /// Opens an inline file directive: `~{f:path/to/file}~`
    pub const FILE_OPEN: &str = "~{f:";
    /// Opens an inline web directive: `~{w:https://example.com}~`
    pub const WEB_OPEN: &str = "~{w:";
    /// Closes either directive.
    pub const CLOSE: &str = "}~";
    /// Visible text kept from a fetched page, in characters.
    pub const MAX_WEB_CHARS: usize = 3000;
    /// Bytes of a fetched page read before the body is cut off.
    pub const MAX_PAGE_BYTES: usize = 512_000;
}

// ─── Prompt ───────────────────────────────────────────────────────────────────

pub mod prompt {
    /// Characters that count as sentence terminators for normalization.
    pub const TERMINATORS: &[char] = &['?', '!', '.'];
    /// Appended when the user text has no terminator.
    pub const DEFAULT_TERMINATOR: char = '.';
    /// Prefix marking a hashtag word in user text.
    pub const HASHTAG_PREFIX: char = '#';
    /// Placeholder in mode instruction templates, replaced by the hashtag.
    pub const MODE_PLACEHOLDER: &str = "#";
}

// ─── Retrieval ────────────────────────────────────────────────────────────────

pub mod retrieval {
    /// Chunks fetched per similarity search.
    pub const TOP_K: usize = 4;
    /// Joins retrieved chunk texts into the context block.
    pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
    /// Placeholder replaced by the retrieved context.
    pub const CONTEXT_PLACEHOLDER: &str = "{context}";
    /// File holding the prebuilt chunk index inside a store directory.
    pub const INDEX_FILE: &str = "index.json";
}

// ─── Formatting ───────────────────────────────────────────────────────────────

pub mod format {
    pub const CODE_FENCE: &str = "```";
    pub const TABLE_CELL_SEPARATOR: char = '|';
    pub const TABLE_RULE: &str = "---";
    pub const CSV_SEPARATOR: char = ',';
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
}

// ─── Default Settings ─────────────────────────────────────────────────────────

pub mod defaults {
    pub const MODEL: &str = "gpt-4o";
    pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
    pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
    pub const TEMPERATURE: f32 = 1.0;
    pub const TOP_P: f32 = 1.0;
    pub const MAX_TOKENS: u32 = 1024;
    pub const MODE: &str = "normal";
    pub const PERSONA: &str = "default";
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
    pub const FETCH_TIMEOUT_SECS: u64 = 30;
    pub const USER_AGENT: &str = "neuma/0.1";
}

// ─── Limits ───────────────────────────────────────────────────────────────────

pub mod limits {
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 2.0;
    pub const MIN_TOP_P: f32 = 0.0;
    pub const MAX_TOP_P: f32 = 1.0;
}
