use archive_core::{count_characters, record_year, ArchiveStats, ContentType};
use archive_logging::{archive_debug, archive_warn};

use crate::store::{ArchiveStore, StoreError};
use crate::transform::plain_text;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedStats {
    pub stats: ArchiveStats,
    /// Records that were unreadable or had no usable timestamp.
    pub skipped: usize,
}

/// Per-year plain-text totals over the archived records of `content_types`.
///
/// Records without content are ignored. Records that are not valid JSON or
/// carry no usable timestamp are skipped with a warning.
pub fn collect_stats(
    store: &ArchiveStore,
    content_types: &[ContentType],
) -> Result<CollectedStats, StoreError> {
    let mut collected = CollectedStats::default();
    for &content_type in content_types {
        for content_id in store.record_ids(content_type)? {
            let payload = match store.read_record(content_type, &content_id) {
                Ok(payload) => payload,
                Err(StoreError::Malformed { path, source }) => {
                    archive_warn!("{:?} is not valid JSON, skipping: {}", path, source);
                    collected.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let content = payload
                .get("content")
                .and_then(|content| content.as_str())
                .unwrap_or_default();
            if content.is_empty() {
                archive_debug!("{} {} has no content", content_type, content_id);
                continue;
            }

            let Some(year) = record_year(content_type, &payload) else {
                archive_warn!(
                    "{} {} has no usable timestamp, skipping",
                    content_type,
                    content_id
                );
                collected.skipped += 1;
                continue;
            };

            let characters = count_characters(&plain_text(content));
            collected.stats.totals_mut(content_type).add(year, characters);
        }
    }
    Ok(collected)
}
