//! Change detection and retrieval of external synonym rules.
//!
//! A [`SynonymSource`] separates the cheap question "did it change?" from the
//! expensive "give me the content", so a reload tick only rebuilds the table
//! when there is something new.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{
    ETAG, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};

use crate::config::is_remote_location;
use crate::error::{Result, SynonymError};

/// An external location holding synonym rules.
pub trait SynonymSource: Send + Sync {
    /// Where the rules live, for logging.
    fn location(&self) -> &str;

    /// Whether the rules changed since they were last observed.
    fn changed(&self) -> Result<bool>;

    /// Retrieve the current rules and record them as observed.
    fn fetch(&self) -> Result<String>;
}

/// Open the source for `location`: `http(s)://` URLs are remote, anything
/// else is a file path, resolved against `config_dir` when relative.
pub fn open_source(
    location: &str,
    config_dir: Option<&Path>,
    timeout: Duration,
) -> Result<Box<dyn SynonymSource>> {
    if is_remote_location(location) {
        Ok(Box::new(RemoteSynonymSource::new(location, timeout)?))
    } else {
        let path = match config_dir {
            Some(dir) if Path::new(location).is_relative() => dir.join(location),
            _ => PathBuf::from(location),
        };
        Ok(Box::new(LocalSynonymSource::new(path)))
    }
}

/// What was observed of a local file the last time it was read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
    hash: u32,
}

/// Synonym rules stored in a local file.
#[derive(Debug)]
pub struct LocalSynonymSource {
    path: PathBuf,
    location: String,
    last: Mutex<Option<FileStamp>>,
}

impl LocalSynonymSource {
    /// Create a source for the file at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        LocalSynonymSource {
            location: path.display().to_string(),
            path,
            last: Mutex::new(None),
        }
    }

    /// Path of the rules file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> Result<(Option<SystemTime>, u64)> {
        let metadata = fs::metadata(&self.path).map_err(|e| {
            SynonymError::fetch(format!("cannot stat synonym file {}: {e}", self.location))
        })?;
        Ok((metadata.modified().ok(), metadata.len()))
    }

    fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| {
            SynonymError::fetch(format!("cannot read synonym file {}: {e}", self.location))
        })
    }
}

impl SynonymSource for LocalSynonymSource {
    fn location(&self) -> &str {
        &self.location
    }

    fn changed(&self) -> Result<bool> {
        let (modified, len) = self.metadata()?;
        let mut last = self.last.lock();
        if let Some(stamp) = last.as_ref() {
            if stamp.modified.is_some() && stamp.modified == modified && stamp.len == len {
                return Ok(false);
            }
        }

        // Timestamps moved (or are unavailable): only a content change counts.
        let hash = crc32fast::hash(&self.read()?);
        let changed = last.as_ref().is_none_or(|stamp| stamp.hash != hash);
        *last = Some(FileStamp {
            modified,
            len,
            hash,
        });
        Ok(changed)
    }

    fn fetch(&self) -> Result<String> {
        // Stat before reading so a write racing the read shows up next tick.
        let (modified, len) = self.metadata()?;
        let bytes = self.read()?;
        let hash = crc32fast::hash(&bytes);
        let content = String::from_utf8(bytes).map_err(|e| {
            SynonymError::fetch(format!("synonym file {} is not UTF-8: {e}", self.location))
        })?;

        *self.last.lock() = Some(FileStamp {
            modified,
            len,
            hash,
        });
        Ok(content)
    }
}

/// HTTP freshness validators of the last observed response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Validators {
    last_modified: Option<String>,
    etag: Option<String>,
}

impl Validators {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Validators {
            last_modified: header(LAST_MODIFIED),
            etag: header(ETAG),
        }
    }

    fn is_empty(&self) -> bool {
        self.last_modified.is_none() && self.etag.is_none()
    }

    fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(last_modified) = &self.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }
        if let Some(etag) = &self.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        request
    }
}

/// Synonym rules served over HTTP(S).
///
/// Change checks are conditional `HEAD` requests against the validators of
/// the last successful fetch. Servers that send neither
/// `Last-Modified` nor `ETag` are treated as changed on every check. Check
/// failures are logged and reported as "unchanged" so the next tick retries.
#[derive(Debug)]
pub struct RemoteSynonymSource {
    url: String,
    client: Client,
    validators: Mutex<Validators>,
}

impl RemoteSynonymSource {
    /// Create a source for `url`; every request is bounded by `timeout`.
    pub fn new<S: Into<String>>(url: S, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(RemoteSynonymSource {
            url: url.into(),
            client,
            validators: Mutex::new(Validators::default()),
        })
    }
}

impl SynonymSource for RemoteSynonymSource {
    fn location(&self) -> &str {
        &self.url
    }

    fn changed(&self) -> Result<bool> {
        let known = self.validators.lock().clone();
        let response = match known.apply(self.client.head(&self.url)).send() {
            Ok(response) => response,
            Err(e) => {
                warn!("synonym source {} unreachable: {e}", self.url);
                return Ok(false);
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(false);
        }
        if !status.is_success() {
            warn!("synonym source {} answered {status}", self.url);
            return Ok(false);
        }

        let current = Validators::from_headers(response.headers());
        if current.is_empty() {
            debug!("synonym source {} sends no validators", self.url);
            return Ok(true);
        }
        // Validators are only recorded by a successful fetch, so a failed
        // download is retried on the next check.
        Ok(current != known)
    }

    fn fetch(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().map_err(|e| {
            SynonymError::fetch(format!("GET {} failed: {e}", self.url))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynonymError::fetch(format!(
                "GET {} answered {status}",
                self.url
            )));
        }

        let validators = Validators::from_headers(response.headers());
        let body = response.text().map_err(|e| {
            SynonymError::fetch(format!("cannot read body of {}: {e}", self.url))
        })?;
        *self.validators.lock() = validators;
        Ok(body)
    }
}
