//! Mode-conditioned reshaping of raw model output into display artifacts.

mod table;

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::catalog::ModeKind;
use crate::constants::format::{CODE_FENCE, CSV_SEPARATOR};
use crate::prompt::hashtag::strip_terminator;

pub use table::Table;

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayArtifact {
    PlainText(String),
    Table(Table),
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    CsvText(String),
}

impl DisplayArtifact {
    /// Text form suitable for copying or piping.
    pub fn to_plain_string(&self) -> String {
        match self {
            DisplayArtifact::PlainText(text) | DisplayArtifact::CsvText(text) => text.clone(),
            DisplayArtifact::Table(table) => table.to_string(),
            DisplayArtifact::CodeBlock { code, .. } => code.clone(),
        }
    }
}

/// Why a mode-specific shape degraded to best-effort output.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatFallback {
    /// Table mode found no lines to build a header from.
    EmptyTable,
    /// Table rows do not all have the header's cell count.
    RaggedTable { header_cells: usize },
    /// Code or csv mode needed a `#hashtag` in the prompt.
    MissingArgument { mode: ModeKind },
}

impl fmt::Display for FormatFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatFallback::EmptyTable => write!(f, "no table found in response, showing text"),
            FormatFallback::RaggedTable { header_cells } => write!(
                f,
                "table rows do not all have {} cells",
                header_cells
            ),
            FormatFallback::MissingArgument { mode } => {
                write!(f, "{} mode expects a #hashtag in the prompt", mode)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Formatted {
    pub artifact: DisplayArtifact,
    pub fallback: Option<FormatFallback>,
}

impl Formatted {
    fn clean(artifact: DisplayArtifact) -> Self {
        Self {
            artifact,
            fallback: None,
        }
    }

    fn degraded(artifact: DisplayArtifact, fallback: FormatFallback) -> Self {
        tracing::debug!(%fallback, "format fallback");
        Self {
            artifact,
            fallback: Some(fallback),
        }
    }
}

/// Collapse blank lines, then keep only the interior of the first fenced block.
///
/// A single opening fence keeps everything after it. Text without a fence
/// passes through unchanged.
pub fn preprocess(raw: &str) -> String {
    let collapsed = RE_BLANK_LINES.replace_all(raw, "\n");
    match collapsed.split(CODE_FENCE).nth(1) {
        Some(inner) => inner.to_string(),
        None => collapsed.into_owned(),
    }
}

pub struct ResponseFormatter;

impl ResponseFormatter {
    /// `mode_argument` is the first hashtag of this turn's prompt, without `#`.
    pub fn format(raw_response: &str, mode: ModeKind, mode_argument: Option<&str>) -> Formatted {
        let text = preprocess(raw_response);
        match mode {
            ModeKind::Normal => Formatted::clean(DisplayArtifact::PlainText(text)),
            ModeKind::Table => Self::format_table(&text),
            ModeKind::Code => Self::format_code(text, mode_argument),
            ModeKind::Csv => Self::format_csv(text, mode_argument),
        }
    }

    fn format_table(text: &str) -> Formatted {
        match Table::parse(text) {
            None => Formatted::degraded(
                DisplayArtifact::PlainText(text.to_string()),
                FormatFallback::EmptyTable,
            ),
            Some(table) if table.is_ragged() => {
                let header_cells = table.header.len();
                Formatted::degraded(
                    DisplayArtifact::Table(table),
                    FormatFallback::RaggedTable { header_cells },
                )
            }
            Some(table) => Formatted::clean(DisplayArtifact::Table(table)),
        }
    }

    fn format_code(code: String, mode_argument: Option<&str>) -> Formatted {
        let language = mode_argument.map(|tag| strip_terminator(tag).to_string());
        match language {
            Some(language) => Formatted::clean(DisplayArtifact::CodeBlock {
                language: Some(language),
                code,
            }),
            None => Formatted::degraded(
                DisplayArtifact::CodeBlock {
                    language: None,
                    code,
                },
                FormatFallback::MissingArgument {
                    mode: ModeKind::Code,
                },
            ),
        }
    }

    fn format_csv(text: String, mode_argument: Option<&str>) -> Formatted {
        match mode_argument.and_then(|tag| tag.chars().next()) {
            Some(delimiter) => {
                let mut buf = [0u8; 4];
                let replaced = text.replace(CSV_SEPARATOR, delimiter.encode_utf8(&mut buf));
                Formatted::clean(DisplayArtifact::CsvText(replaced))
            }
            None => Formatted::degraded(
                DisplayArtifact::PlainText(text),
                FormatFallback::MissingArgument { mode: ModeKind::Csv },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_collapses_blank_line_runs() {
        assert_eq!(preprocess("a\n\nb\n\n\n\nc"), "a\nb\nc");
    }

    #[test]
    fn test_preprocess_keeps_first_fence_interior() {
        let raw = "Here you go:\n```\nlet x = 1;\n```\nand\n```\nother\n```";
        assert_eq!(preprocess(raw), "\nlet x = 1;\n");
    }

    #[test]
    fn test_preprocess_unclosed_fence_keeps_tail() {
        assert_eq!(preprocess("intro ```tail"), "tail");
    }

    #[test]
    fn test_preprocess_without_fence_is_identity() {
        assert_eq!(preprocess("just text\nline two"), "just text\nline two");
    }
}
