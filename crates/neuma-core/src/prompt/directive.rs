//! Inline directives: `~{f:path}~` splices in a file, `~{w:url}~` splices in
//! the visible text of a web page.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{defaults, directives};
use crate::error::NeumaError;

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static RE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// File-read collaborator. Fails when the path does not name a readable file.
#[async_trait::async_trait]
pub trait FileReader: Send + Sync {
    async fn read(&self, path: &str) -> Result<String, NeumaError>;
}

/// Raw result of a web fetch; status handling is left to the caller.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub html: String,
}

/// Web-fetch collaborator.
#[async_trait::async_trait]
pub trait WebFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, NeumaError>;
}

/// Reads directive files from the local filesystem.
pub struct FsFileReader;

#[async_trait::async_trait]
impl FileReader for FsFileReader {
    async fn read(&self, path: &str) -> Result<String, NeumaError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(NeumaError::Other(format!("Not a file: {path}")));
        }
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// At most `max_bytes` of `body` as text; a character split by the cut is
/// replaced rather than rejected.
fn decode_capped(body: &[u8], max_bytes: usize) -> String {
    let end = body.len().min(max_bytes);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

/// Fetches directive URLs over HTTP.
pub struct HttpWebFetcher {
    client: reqwest::Client,
}

impl HttpWebFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::FETCH_TIMEOUT_SECS))
            .user_agent(defaults::USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpWebFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WebFetcher for HttpWebFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, NeumaError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NeumaError::Other(format!("Request failed: {e}")))?;
        let status = response.status().as_u16();

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| NeumaError::Other(format!("Failed to read response: {e}")))?
        {
            body.extend_from_slice(&chunk);
            if body.len() >= directives::MAX_PAGE_BYTES {
                tracing::debug!(url, limit = directives::MAX_PAGE_BYTES, "page body cut off");
                break;
            }
        }
        let html = decode_capped(&body, directives::MAX_PAGE_BYTES);
        Ok(FetchedPage { status, html })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    File,
    Web,
}

impl DirectiveKind {
    fn open_marker(&self) -> &'static str {
        match self {
            DirectiveKind::File => directives::FILE_OPEN,
            DirectiveKind::Web => directives::WEB_OPEN,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::File => f.write_str("file"),
            DirectiveKind::Web => f.write_str("web"),
        }
    }
}

/// A directive that was left in place. Non-fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveUnresolved {
    pub kind: DirectiveKind,
    pub target: String,
    pub reason: String,
}

impl fmt::Display for DirectiveUnresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} directive '{}' left unresolved: {}",
            self.kind, self.target, self.reason
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub text: String,
    pub unresolved: Vec<DirectiveUnresolved>,
}

/// Location of the first directive of a kind.
struct DirectiveSpan<'a> {
    start: usize,
    end: usize,
    target: &'a str,
}

fn locate(text: &str, kind: DirectiveKind) -> Option<Result<DirectiveSpan<'_>, ()>> {
    let open = kind.open_marker();
    let start = text.find(open)?;
    let target_start = start + open.len();
    let Some(close) = text[target_start..].find(directives::CLOSE) else {
        return Some(Err(()));
    };
    let target_end = target_start + close;
    Some(Ok(DirectiveSpan {
        start,
        end: target_end + directives::CLOSE.len(),
        target: &text[target_start..target_end],
    }))
}

/// Reduce an HTML page to whitespace-collapsed visible text of at most
/// `max_chars` characters.
pub fn extract_visible_text(html: &str, max_chars: usize) -> String {
    let text = RE_SCRIPT.replace_all(html, " ");
    let text = RE_STYLE.replace_all(&text, " ");
    let text = RE_COMMENT.replace_all(&text, " ");
    let text = RE_TAG.replace_all(&text, " ");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let text = RE_WHITESPACE.replace_all(&text, " ");
    text.trim().chars().take(max_chars).collect()
}

/// Substitutes file and web directives in user text.
///
/// Only the first directive of each kind is resolved; later ones stay as
/// literal text.
#[derive(Clone)]
pub struct DirectiveResolver {
    files: Arc<dyn FileReader>,
    web: Arc<dyn WebFetcher>,
    max_web_chars: usize,
}

impl DirectiveResolver {
    pub fn new(files: Arc<dyn FileReader>, web: Arc<dyn WebFetcher>) -> Self {
        Self {
            files,
            web,
            max_web_chars: directives::MAX_WEB_CHARS,
        }
    }

    pub async fn resolve(&self, raw_text: &str) -> Resolution {
        let mut text = raw_text.to_string();
        let mut unresolved = Vec::new();

        for kind in [DirectiveKind::File, DirectiveKind::Web] {
            let span = match locate(&text, kind) {
                None => continue,
                Some(Err(())) => {
                    unresolved.push(DirectiveUnresolved {
                        kind,
                        target: String::new(),
                        reason: "missing closing marker".into(),
                    });
                    continue;
                }
                Some(Ok(span)) => span,
            };

            let target = span.target.to_string();
            let (start, end) = (span.start, span.end);
            match self.fetch_content(kind, &target).await {
                Ok(content) => {
                    tracing::debug!(%kind, target, chars = content.len(), "directive resolved");
                    text.replace_range(start..end, &content);
                }
                Err(reason) => {
                    tracing::debug!(%kind, target, reason, "directive unresolved");
                    unresolved.push(DirectiveUnresolved {
                        kind,
                        target,
                        reason,
                    });
                }
            }
        }

        Resolution { text, unresolved }
    }

    async fn fetch_content(&self, kind: DirectiveKind, target: &str) -> Result<String, String> {
        match kind {
            DirectiveKind::File => self.files.read(target).await.map_err(|e| e.to_string()),
            DirectiveKind::Web => {
                let page = self.web.fetch(target).await.map_err(|e| e.to_string())?;
                if !(200..300).contains(&page.status) {
                    return Err(format!("HTTP status {}", page.status));
                }
                let content = extract_visible_text(&page.html, self.max_web_chars);
                if content.is_empty() {
                    return Err("page has no visible text".into());
                }
                Ok(content)
            }
        }
    }
}
