use std::fs;

use archive_core::{CanonicalPath, ContentType};
use archive_engine::{
    append_line, ensure_output_dir, ArchiveStore, AtomicFileWriter, CensorshipLedger,
    NOT_FOUND_FILE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_content() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("1.json", "{}").unwrap();
    assert_eq!(first.file_name().unwrap(), "1.json");
    let second = writer.write("1.json", r#"{"id":1}"#).unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), r#"{"id":1}"#);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn no_partial_file_when_target_dir_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("1.json", "data").is_err());
    assert!(!file_path.with_file_name("1.json").exists());
}

#[test]
fn appended_lines_accumulate() {
    let temp = TempDir::new().unwrap();
    let list = temp.path().join(NOT_FOUND_FILE);
    append_line(&list, "/answer/1").unwrap();
    append_line(&list, "/p/2").unwrap();
    assert_eq!(fs::read_to_string(&list).unwrap(), "/answer/1\n/p/2\n");
}

#[test]
fn store_lays_out_records_by_type() {
    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    assert!(temp.path().join("answer").is_dir());
    assert!(temp.path().join("article").is_dir());

    store
        .write_record(&CanonicalPath::new("/question/1/answer/10"), br#"{"id":10}"#)
        .unwrap();
    store
        .write_record(&CanonicalPath::new("/p/9"), br#"{"id":9}"#)
        .unwrap();
    store
        .write_record(&CanonicalPath::new("/answer/2"), b"not json")
        .unwrap();

    assert!(temp.path().join("answer/10.json").is_file());
    assert!(temp.path().join("article/9.json").is_file());
    assert_eq!(store.record_ids(ContentType::Answer).unwrap(), vec!["10", "2"]);
    assert_eq!(store.read_record(ContentType::Article, "9").unwrap()["id"], 9);
    assert!(store.read_record(ContentType::Answer, "2").is_err());
    assert_eq!(store.archived_ids().unwrap().len(), 3);
}

#[test]
fn not_found_entries_survive_reopen_and_are_not_duplicated() {
    let temp = TempDir::new().unwrap();
    {
        let store = ArchiveStore::open(temp.path()).unwrap();
        assert!(store.record_not_found("/answer/3").unwrap());
        assert!(!store.record_not_found("/answer/3").unwrap());
    }
    let store = ArchiveStore::open(temp.path()).unwrap();
    assert!(store.is_not_found("/answer/3"));
    assert_eq!(store.not_found_count(), 1);
    assert_eq!(
        fs::read_to_string(temp.path().join(NOT_FOUND_FILE)).unwrap(),
        "/answer/3\n"
    );
}

#[test]
fn ledger_keeps_non_ascii_and_insertion_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("censorship.json");

    let mut ledger = CensorshipLedger::load(&path).unwrap();
    assert!(ledger.is_empty());
    ledger.record("/p/2", true).unwrap();
    ledger.record("/answer/中文", false).unwrap();
    ledger.record("/p/2", false).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(written, "{\n    \"/p/2\": false,\n    \"/answer/中文\": false\n}");

    let reloaded = CensorshipLedger::load(&path).unwrap();
    assert_eq!(reloaded, ledger);
    assert_eq!(reloaded.get("/p/2"), Some(false));
    assert_eq!(reloaded.get("/p/3"), None);
}
