use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use archive_core::{BackoffPolicy, CanonicalPath, ContentType, PathResolver, Throttle};
use archive_engine::{
    ArchiveError, ArchiveEvent, ArchiveStore, Archiver, FailureKind, FetchError, FetchOutcome,
    FetchSettings, Fetcher, ProgressSink, ReqwestFetcher, SkipReason, NOT_FOUND_FILE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(archive_logging::initialize_for_tests);
}

fn paths(raw: &[&str]) -> Vec<CanonicalPath> {
    let mut resolver = PathResolver::new();
    resolver.add_paths(raw.iter().copied());
    resolver.resolve()
}

fn fast_policy(retries: u32) -> BackoffPolicy {
    BackoffPolicy {
        base_delay: Duration::from_millis(1),
        multiplier: 1,
        max_attempts: retries,
        floor_delay: Duration::ZERO,
        floor_attempts: 0,
    }
}

async fn mount_json(server: &MockServer, at: &str, body: &str, calls: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(calls)
        .mount(server)
        .await;
}

#[derive(Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<ArchiveEvent>>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<ArchiveEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ArchiveEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Replays canned outcomes in order and counts calls.
struct ScriptedFetcher {
    outcomes: Mutex<VecDeque<FetchOutcome>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new(outcomes: Vec<FetchOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FetchOutcome::NotFound)
    }
}

fn payload(body: &str) -> FetchOutcome {
    FetchOutcome::Payload(archive_engine::FetchOutput {
        bytes: body.as_bytes().to_vec(),
        metadata: archive_engine::FetchMetadata {
            url: String::new(),
            status: 200,
            content_type: None,
            byte_len: body.len() as u64,
        },
    })
}

fn timeout() -> FetchOutcome {
    FetchOutcome::Fatal(FetchError {
        kind: FailureKind::Timeout,
        message: "timed out".to_string(),
    })
}

#[tokio::test]
async fn second_run_issues_no_requests() {
    init_logging();
    let server = MockServer::start().await;
    mount_json(&server, "/answer/1", r#"{"id":1}"#, 1).await;
    mount_json(&server, "/p/2", r#"{"id":2}"#, 1).await;

    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let archiver = Archiver::new(&fetcher, &store, server.uri()).with_throttle(Throttle::none());
    let seeds = paths(&["/answer/1", "/p/2"]);

    let first = archiver.run_batch(&seeds).await.unwrap();
    assert_eq!(first.fetched, 2);
    assert_eq!(
        fs::read_to_string(store.record_path(ContentType::Answer, "1")).unwrap(),
        r#"{"id":1}"#
    );
    assert!(store.has_record(ContentType::Article, "2"));

    let second = archiver.run_batch(&seeds).await.unwrap();
    assert_eq!(second.fetched, 0);
    assert_eq!(second.skipped_archived, 2);
    assert!(archiver.pending(&seeds).is_empty());
}

#[tokio::test]
async fn not_found_paths_are_never_retried() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/answer/404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let seeds = paths(&["/answer/404"]);
    let sink = RecordingSink::default();

    {
        let store = ArchiveStore::open(temp.path()).unwrap();
        let archiver = Archiver::new(&fetcher, &store, server.uri())
            .with_throttle(Throttle::none())
            .with_sink(&sink);
        let summary = archiver.run_batch(&seeds).await.unwrap();
        assert_eq!(summary.not_found, 1);
    }
    assert_eq!(
        fs::read_to_string(temp.path().join(NOT_FOUND_FILE)).unwrap(),
        "/answer/404\n"
    );

    let reopened = ArchiveStore::open(temp.path()).unwrap();
    let archiver = Archiver::new(&fetcher, &reopened, server.uri())
        .with_throttle(Throttle::none())
        .with_sink(&sink);
    let summary = archiver.run_batch(&seeds).await.unwrap();
    assert_eq!(summary.skipped_not_found, 1);
    assert!(!reopened.has_record(ContentType::Answer, "404"));

    assert_eq!(
        sink.take(),
        vec![
            ArchiveEvent::NotFound {
                path: "/answer/404".to_string()
            },
            ArchiveEvent::Skipped {
                path: "/answer/404".to_string(),
                reason: SkipReason::KnownNotFound
            },
        ]
    );
}

#[tokio::test]
async fn forbidden_aborts_batch_and_keeps_earlier_records() {
    init_logging();
    let server = MockServer::start().await;
    mount_json(&server, "/answer/1", r#"{"id":1}"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/answer/2"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    mount_json(&server, "/answer/3", r#"{"id":3}"#, 0).await;

    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let archiver = Archiver::new(&fetcher, &store, server.uri()).with_throttle(Throttle::none());

    let err = archiver
        .run_batch(&paths(&["/answer/3", "/answer/2", "/answer/1"]))
        .await
        .unwrap_err();
    match err {
        ArchiveError::Fatal { path, error } => {
            assert_eq!(path, "/answer/2");
            assert_eq!(error.kind, FailureKind::AccessDenied);
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(store.has_record(ContentType::Answer, "1"));
    assert!(!store.has_record(ContentType::Answer, "3"));
}

#[tokio::test]
async fn envelope_retries_the_batch_until_it_succeeds() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    let fetcher = ScriptedFetcher::new(vec![
        payload(r#"{"id":1}"#),
        timeout(),
        payload(r#"{"id":2}"#),
    ]);
    let archiver =
        Archiver::new(&fetcher, &store, "https://api.test").with_throttle(Throttle::none());

    let summary = archiver
        .run(&paths(&["/answer/1", "/answer/2"]), &fast_policy(3))
        .await
        .unwrap();

    // The retried batch skips the record written before the failure.
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.skipped_archived, 1);
    assert_eq!(
        fetcher.calls(),
        vec![
            "https://api.test/answer/1",
            "https://api.test/answer/2",
            "https://api.test/answer/2",
        ]
    );
}

#[tokio::test]
async fn exhausted_envelope_returns_last_error() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    let fetcher = ScriptedFetcher::new(vec![timeout(), timeout(), timeout()]);
    let archiver =
        Archiver::new(&fetcher, &store, "https://api.test/").with_throttle(Throttle::none());

    let err = archiver
        .run(&paths(&["/answer/5"]), &fast_policy(2))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ArchiveError::Fatal { ref error, .. } if error.kind == FailureKind::Timeout
    ));
    assert_eq!(fetcher.calls().len(), 3);
}

#[test]
fn request_url_joins_base_and_path() {
    let temp = TempDir::new().unwrap();
    let store = ArchiveStore::open(temp.path()).unwrap();
    let fetcher = ScriptedFetcher::new(Vec::new());
    let archiver = Archiver::new(&fetcher, &store, "https://api.test/v4/");

    assert_eq!(
        archiver.request_url(&CanonicalPath::new("/question/9/answer/2")),
        "https://api.test/v4/question/9/answer/2"
    );
}
