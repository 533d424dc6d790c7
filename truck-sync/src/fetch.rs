//! Blocking, cache-aware downloads.
//!
//! [`Fetcher::download`] never raises: every call reports a
//! [`FetchOutcome`] and callers decide whether a failure aborts their step.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use truck_core::Settings;

use crate::cache::{ArtifactCache, CacheLookup};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// An opened response body.
pub struct Download {
    pub reader: Box<dyn Read + Send>,
    pub content_length: Option<u64>,
}

/// Where bytes come from. Errors are plain strings; they only ever end up in
/// a warning line or a [`FetchOutcome::Failed`].
pub trait Transport {
    fn open(&self, url: &str) -> Result<Download, String>;
}

/// HTTP(S) through `ureq`, plus `file://` URLs read from disk.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .timeout_read(Duration::from_secs(60))
            .user_agent(concat!("truck/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn open(&self, url: &str) -> Result<Download, String> {
        if let Some(path) = url.strip_prefix("file://") {
            let file = File::open(path).map_err(|e| format!("{path}: {e}"))?;
            let content_length = file.metadata().ok().map(|m| m.len());
            return Ok(Download {
                reader: Box::new(file),
                content_length,
            });
        }

        match self.agent.get(url).call() {
            Ok(response) => {
                let content_length = response
                    .header("Content-Length")
                    .and_then(|value| value.parse().ok());
                Ok(Download {
                    reader: Box::new(response.into_reader()),
                    content_length,
                })
            }
            Err(ureq::Error::Status(code, _)) => Err(format!("HTTP {code}")),
            Err(err) => Err(err.to_string()),
        }
    }
}

/// In-memory transport that counts requests. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    bodies: HashMap<String, Vec<u8>>,
    requests: Vec<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`, replacing any previous body.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.state().bodies.insert(url.into(), body.into());
    }

    pub fn remove(&self, url: &str) {
        self.state().bodies.remove(url);
    }

    /// Total requests made, served or not.
    pub fn requests(&self) -> usize {
        self.state().requests.len()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.state().requests.iter().filter(|u| *u == url).count()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: &str) -> Result<Download, String> {
        let mut state = self.state();
        state.requests.push(url.to_string());
        let body = state
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| "HTTP 404".to_string())?;
        Ok(Download {
            content_length: Some(body.len() as u64),
            reader: Box::new(Cursor::new(body)),
        })
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Outcome of a single [`Fetcher::download`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from the local cache; no network request was made.
    CacheHit,
    /// Retrieved over the transport.
    Downloaded { bytes: u64 },
    /// The expected local file is absent; `reason` was already logged.
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FetchOutcome::Failed { .. })
    }
}

pub struct Fetcher {
    transport: Box<dyn Transport>,
    cache: ArtifactCache,
    show_progress: bool,
}

impl Fetcher {
    pub fn new(transport: Box<dyn Transport>, cache: ArtifactCache) -> Self {
        Self {
            transport,
            cache,
            show_progress: false,
        }
    }

    /// Network fetcher using the settings' cache root and progress choice.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Box::new(UreqTransport::new()),
            ArtifactCache::new(&settings.cache_root),
        )
        .with_progress(settings.show_progress)
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Fetch `url` into `dest`.
    ///
    /// With `use_cache`, a cached blob is copied instead of hitting the
    /// network. Every network retrieval is stored back into the cache; a
    /// failed store only costs future hits.
    pub fn download(&self, url: &str, dest: &Path, use_cache: bool) -> FetchOutcome {
        if use_cache && self.cache.fetch_to_local(url, dest) == CacheLookup::Hit {
            return FetchOutcome::CacheHit;
        }

        match self.retrieve(url, dest) {
            Ok(bytes) => {
                debug!(%url, bytes, "downloaded");
                if let Err(err) = self.cache.store(url, dest) {
                    warn!(%url, "cache write failed: {err}");
                }
                FetchOutcome::Downloaded { bytes }
            }
            Err(reason) => {
                warn!(%url, "download failed: {reason}");
                let _ = std::fs::remove_file(dest);
                FetchOutcome::Failed { reason }
            }
        }
    }

    fn retrieve(&self, url: &str, dest: &Path) -> Result<u64, String> {
        let _ = std::fs::remove_file(dest);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
        }

        let download = self.transport.open(url)?;
        let bar = self.progress_bar(url, download.content_length);
        let mut reader = bar.wrap_read(download.reader);
        let mut file = File::create(dest).map_err(|e| format!("{}: {e}", dest.display()))?;
        let copied = std::io::copy(&mut reader, &mut file);
        bar.finish_and_clear();
        copied.map_err(|e| format!("reading body: {e}"))
    }

    fn progress_bar(&self, url: &str, content_length: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let label = url.rsplit('/').next().unwrap_or(url).to_string();
        let (bar, template) = match content_length {
            Some(len) => (
                ProgressBar::new(len),
                "{msg} {percent:>3}% {bytes}/{total_bytes} {binary_bytes_per_sec} {elapsed}",
            ),
            None => (
                ProgressBar::new_spinner(),
                "{msg} {bytes} {binary_bytes_per_sec} {elapsed}",
            ),
        };
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style);
        }
        bar.set_message(label);
        bar
    }
}
