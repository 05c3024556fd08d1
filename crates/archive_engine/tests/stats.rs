use std::fs;
use std::sync::Once;

use archive_core::{ContentType, YearTotal};
use archive_engine::{collect_stats, ArchiveStore};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(archive_logging::initialize_for_tests);
}

fn write(store: &ArchiveStore, content_type: ContentType, id: &str, body: &str) {
    fs::write(store.record_path(content_type, id), body).unwrap();
}

#[test]
fn yearly_totals_count_plain_text_characters() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    // 2021-01-01T00:00:00Z
    write(
        &store,
        ContentType::Answer,
        "1",
        r#"{"created_time":1609459200,"content":"<p>Hello <b>world</b></p><script>x()</script>"}"#,
    );
    write(
        &store,
        ContentType::Answer,
        "2",
        r#"{"created_time":1609459300,"content":"<p>你好</p><p>再见</p>"}"#,
    );
    write(
        &store,
        ContentType::Article,
        "3",
        r#"{"created":1609459200,"content":"<p>abc</p>"}"#,
    );

    let collected = collect_stats(&store, &ContentType::ALL).unwrap();
    assert_eq!(collected.skipped, 0);
    assert_eq!(
        collected.stats.answers.get(2021),
        Some(YearTotal {
            characters: 14,
            items: 2
        })
    );
    assert_eq!(
        collected.stats.articles.total(),
        YearTotal {
            characters: 3,
            items: 1
        }
    );
}

#[test]
fn unreadable_and_undated_records_are_skipped() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    write(&store, ContentType::Answer, "1", "{ not json");
    write(&store, ContentType::Answer, "2", r#"{"content":"<p>undated</p>"}"#);
    write(&store, ContentType::Answer, "3", r#"{"created_time":1609459200,"content":""}"#);

    let collected = collect_stats(&store, &[ContentType::Answer]).unwrap();
    assert_eq!(collected.skipped, 2);
    assert!(collected.stats.answers.is_empty());
}

#[test]
fn only_requested_types_are_counted() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    write(
        &store,
        ContentType::Answer,
        "1",
        r#"{"created_time":1609459200,"content":"<p>a</p>"}"#,
    );

    let collected = collect_stats(&store, &[ContentType::Article]).unwrap();
    assert!(collected.stats.answers.is_empty());
    assert!(collected.stats.articles.is_empty());
}
