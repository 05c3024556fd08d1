use archive_engine::{ArchiveEvent, ProgressSink, SkipReason};
use archive_logging::{archive_debug, archive_info};

/// Reports engine progress through the process logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: ArchiveEvent) {
        match event {
            ArchiveEvent::Fetched { path, bytes } => archive_info!("saved {} ({} bytes)", path, bytes),
            ArchiveEvent::NotFound { path } => archive_info!("{} not found", path),
            ArchiveEvent::Skipped {
                path,
                reason: SkipReason::AlreadyArchived,
            } => archive_debug!("{} already archived", path),
            ArchiveEvent::Skipped {
                path,
                reason: SkipReason::KnownNotFound,
            } => archive_debug!("{} known missing", path),
            ArchiveEvent::Classified { key, censored } => {
                archive_info!("{} censored={}", key, censored)
            }
        }
    }
}
