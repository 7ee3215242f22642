//! Raw byte fetching for config sources
//!
//! Resolves a source name (file path, `http(s)://` URL, or `"stdin:"`) to
//! raw bytes. The merge engine only depends on the [`Fetch`] trait, so tests
//! can substitute an in-memory fetcher and the real transport stays at the
//! edge of the pipeline.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

use crate::source::STDIN_SOURCE;

/// Default timeout for HTTP fetches.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from resolving a source name to bytes.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch '{url}'")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from '{url}'")]
    HttpStatus { url: String, status: u16 },

    #[error("no config registered for '{0}'")]
    NotFound(String),
}

/// Resolves a source name to its raw bytes.
pub trait Fetch {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher backed by the filesystem, stdin, and blocking HTTP.
#[derive(Debug, Clone)]
pub struct StandardFetcher {
    timeout: Duration,
}

impl StandardFetcher {
    pub fn new() -> Self {
        Self {
            timeout: HTTP_TIMEOUT,
        }
    }

    /// Override the HTTP timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
        let response = client.get(url).send().map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

impl Default for StandardFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for StandardFetcher {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        if name == STDIN_SOURCE {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|source| FetchError::Io {
                    path: name.to_string(),
                    source,
                })?;
            return Ok(buf);
        }
        if name.starts_with("http://") || name.starts_with("https://") {
            return self.fetch_http(name);
        }
        std::fs::read(name).map_err(|source| FetchError::Io {
            path: name.to_string(),
            source,
        })
    }
}

/// In-memory fetcher for tests and embedding.
///
/// Records the order in which sources were fetched so callers can assert
/// fail-fast behaviour.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    entries: BTreeMap<String, Vec<u8>>,
    log: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source body under a name.
    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), body.into());
    }

    /// Names fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(name.to_string());
        }
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(name.to_string()))
    }
}
