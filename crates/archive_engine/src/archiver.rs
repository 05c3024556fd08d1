use archive_core::{BackoffPolicy, CanonicalPath, Throttle};
use archive_logging::{archive_debug, archive_error, archive_info};
use thiserror::Error;

use crate::fetch::{Fetcher, NullProgressSink, ProgressSink};
use crate::retry::run_with_backoff;
use crate::store::{ArchiveStore, StoreError};
use crate::{ArchiveEvent, FetchError, FetchOutcome, SkipReason};

static NULL_SINK: NullProgressSink = NullProgressSink;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("fetching {path} aborted the batch: {error}")]
    Fatal { path: String, error: FetchError },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub fetched: usize,
    pub not_found: usize,
    pub skipped_archived: usize,
    pub skipped_not_found: usize,
}

/// Fetches every unresolved path once, consulting the store before each request.
pub struct Archiver<'a> {
    fetcher: &'a dyn Fetcher,
    store: &'a ArchiveStore,
    api_base: String,
    throttle: Throttle,
    sink: &'a dyn ProgressSink,
}

impl<'a> Archiver<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, store: &'a ArchiveStore, api_base: impl Into<String>) -> Self {
        Self {
            fetcher,
            store,
            api_base: api_base.into(),
            throttle: Throttle::for_fetch(),
            sink: &NULL_SINK,
        }
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn request_url(&self, path: &CanonicalPath) -> String {
        let base = self.api_base.trim_end_matches('/');
        let raw = path.raw_path();
        if raw.starts_with('/') {
            format!("{base}{raw}")
        } else {
            format!("{base}/{raw}")
        }
    }

    /// Why `path` needs no request, if it needs none.
    pub fn skip_reason(&self, path: &CanonicalPath) -> Option<SkipReason> {
        if self.store.is_not_found(path.raw_path()) {
            return Some(SkipReason::KnownNotFound);
        }
        if self.store.has_record(path.content_type(), path.content_id()) {
            return Some(SkipReason::AlreadyArchived);
        }
        None
    }

    pub fn pending<'p>(&self, paths: &'p [CanonicalPath]) -> Vec<&'p CanonicalPath> {
        paths
            .iter()
            .filter(|path| self.skip_reason(path).is_none())
            .collect()
    }

    /// One pass over `paths`. Stops at the first fatal response; everything
    /// persisted up to that point stays on disk.
    pub async fn run_batch(&self, paths: &[CanonicalPath]) -> Result<BatchSummary, ArchiveError> {
        let mut summary = BatchSummary::default();
        let pending = self.pending(paths).len();
        archive_info!("{} of {} paths still to fetch", pending, paths.len());

        for path in paths {
            if let Some(reason) = self.skip_reason(path) {
                match reason {
                    SkipReason::AlreadyArchived => summary.skipped_archived += 1,
                    SkipReason::KnownNotFound => summary.skipped_not_found += 1,
                }
                self.sink.emit(ArchiveEvent::Skipped {
                    path: path.raw_path().to_string(),
                    reason,
                });
                continue;
            }

            let url = self.request_url(path);
            archive_debug!("GET {}", url);
            match self.fetcher.fetch(&url).await {
                FetchOutcome::Payload(output) => {
                    self.store.write_record(path, &output.bytes)?;
                    summary.fetched += 1;
                    self.sink.emit(ArchiveEvent::Fetched {
                        path: path.raw_path().to_string(),
                        bytes: output.metadata.byte_len,
                    });
                }
                FetchOutcome::NotFound => {
                    self.store.record_not_found(path.raw_path())?;
                    summary.not_found += 1;
                    archive_info!("{} is gone, recorded as not found", path);
                    self.sink.emit(ArchiveEvent::NotFound {
                        path: path.raw_path().to_string(),
                    });
                }
                FetchOutcome::Fatal(error) => {
                    archive_error!("Fetching {} failed: {}", path, error);
                    return Err(ArchiveError::Fatal {
                        path: path.raw_path().to_string(),
                        error,
                    });
                }
            }

            tokio::time::sleep(self.throttle.sample()).await;
        }

        archive_info!(
            "batch done: {} fetched, {} not found, {} already archived, {} known missing",
            summary.fetched,
            summary.not_found,
            summary.skipped_archived,
            summary.skipped_not_found
        );
        Ok(summary)
    }

    /// [`Archiver::run_batch`] inside the backoff envelope.
    pub async fn run(
        &self,
        paths: &[CanonicalPath],
        policy: &BackoffPolicy,
    ) -> Result<BatchSummary, ArchiveError> {
        run_with_backoff(policy, "fetch batch", || self.run_batch(paths)).await
    }
}
