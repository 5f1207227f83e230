//! Document sources: where raw document text comes from.
//!
//! A [`Locator`] names a document (a file path or a URL). A
//! [`DocumentSource`] turns a locator into text. [`DefaultSource`] reads
//! files with `tokio::fs` and fetches URLs with `reqwest`;
//! [`MemorySource`] serves documents from memory for tests and embedders.

// Internal imports (std, crate)
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::format::Format;

// External imports (alphabetized)
use thiserror::Error;
use tokio::fs;
use url::Url;

/// Location of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Url(Url),
    File(PathBuf),
}

impl Locator {
    /// Interpret a user-supplied location. `http://`, `https://` and
    /// `file://` are URLs, anything else is a file path.
    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        if has_url_scheme(location) {
            return Url::parse(location).map(Self::Url);
        }
        Ok(Self::File(PathBuf::from(location)))
    }

    /// Resolve a reference relative to this document.
    pub fn join(&self, reference: &str) -> Result<Self, url::ParseError> {
        if has_url_scheme(reference) {
            return Url::parse(reference).map(Self::Url);
        }
        match self {
            Self::Url(base) => base.join(reference).map(Self::Url),
            Self::File(path) => {
                let dir = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Self::File(normalize(&dir.join(reference))))
            }
        }
    }

    /// Resolve a reference found in a document with no location of its
    /// own (inline text), relative to `base_dir` or the working directory.
    pub fn join_detached(reference: &str, base_dir: Option<&Path>) -> Result<Self, url::ParseError> {
        if has_url_scheme(reference) {
            return Url::parse(reference).map(Self::Url);
        }
        let path = match base_dir {
            Some(dir) => dir.join(reference),
            None => PathBuf::from(reference),
        };
        Ok(Self::File(normalize(&path)))
    }

    /// Format declared by the file extension of the path or URL path.
    pub fn declared_format(&self) -> Option<Format> {
        match self {
            Self::Url(url) => Format::from_extension(url.path()),
            Self::File(path) => Format::from_extension(path),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(url) if url.scheme() != "file")
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url.as_str()),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn has_url_scheme(location: &str) -> bool {
    ["http://", "https://", "file://"].iter().any(|scheme| {
        location
            .get(..scheme.len())
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Text returned by a [`DocumentSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub text: String,
    /// `Content-Type` reported by the transport, if any
    pub media_type: Option<String>,
}

impl Fetched {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_type: None,
        }
    }

    /// Format declared by the media type or, failing that, the locator.
    pub fn declared_format(&self, locator: &Locator) -> Option<Format> {
        self.media_type
            .as_deref()
            .and_then(Format::from_media_type)
            .or_else(|| locator.declared_format())
    }
}

/// Failure to obtain document text.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,
    #[error("HTTP {status}")]
    Status { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Disabled(String),
    #[error("not found")]
    NotFound,
}

/// Supplies raw document text for a locator.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, locator: &Locator) -> impl Future<Output = Result<Fetched, FetchError>> + Send;
}

/// Reads files from disk and fetches URLs over HTTP.
#[derive(Debug, Clone)]
pub struct DefaultSource {
    client: reqwest::Client,
    allow_remote: bool,
    allow_files: bool,
}

impl DefaultSource {
    /// Build a source honoring the fetch policy and timeout of `config`.
    pub fn new(config: &Config) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            allow_remote: config.allow_remote_refs,
            allow_files: config.allow_file_refs,
        })
    }

    async fn fetch_url(&self, url: &Url) -> Result<Fetched, FetchError> {
        let response = self.client.get(url.clone()).send().await.map_err(map_reqwest)?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let text = response.text().await.map_err(map_reqwest)?;
        Ok(Fetched { text, media_type })
    }

    async fn read_file(&self, path: &Path) -> Result<Fetched, FetchError> {
        let text = fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound,
            _ => FetchError::Io(e),
        })?;
        Ok(Fetched::new(text))
    }
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

impl DocumentSource for DefaultSource {
    async fn fetch(&self, locator: &Locator) -> Result<Fetched, FetchError> {
        match locator {
            Locator::Url(url) if url.scheme() == "file" => {
                if !self.allow_files {
                    return Err(FetchError::Disabled("file references are disabled".into()));
                }
                let path = url
                    .to_file_path()
                    .map_err(|_| FetchError::Network(format!("invalid file URL {url}")))?;
                self.read_file(&path).await
            }
            Locator::Url(url) => {
                if !self.allow_remote {
                    return Err(FetchError::Disabled("remote references are disabled".into()));
                }
                log::debug!("fetching {url}");
                self.fetch_url(url).await
            }
            Locator::File(path) => {
                if !self.allow_files {
                    return Err(FetchError::Disabled("file references are disabled".into()));
                }
                log::debug!("reading {}", path.display());
                self.read_file(path).await
            }
        }
    }
}

/// Serves documents from an in-memory table keyed by locator string.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, Fetched>,
    delay: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `text` under `location` (a path or URL, as written in refs).
    pub fn insert(&mut self, location: &str, text: impl Into<String>) -> &mut Self {
        let key = Locator::parse(location)
            .map(|l| l.to_string())
            .unwrap_or_else(|_| location.to_string());
        self.documents.insert(key, Fetched::new(text));
        self
    }

    /// Delay every fetch; used to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl DocumentSource for MemorySource {
    async fn fetch(&self, locator: &Locator) -> Result<Fetched, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.documents
            .get(&locator.to_string())
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}
