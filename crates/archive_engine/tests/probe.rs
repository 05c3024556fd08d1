use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use archive_core::{
    ApiError, BackoffPolicy, ClassificationError, ContentType, Throttle, CONTENT_REMOVED_CODE,
};
use archive_engine::{
    ArchiveStore, CensorshipLedger, CensorshipProbe, Classifier, Credential, FailureKind,
    FetchSettings, ProbeEndpoints, ProbeError, ReqwestClassifier, CENSORSHIP_FILE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(archive_logging::initialize_for_tests);
}

fn endpoints(server: &MockServer) -> ProbeEndpoints {
    ProbeEndpoints {
        answer_base: format!("{}/answers/", server.uri()),
        article_base: format!("{}/articles/", server.uri()),
    }
}

fn classifier(server: &MockServer, cookies: &[(&str, &str)]) -> ReqwestClassifier {
    let credentials = cookies
        .iter()
        .map(|(name, value)| Credential::new(*name, *value))
        .collect();
    ReqwestClassifier::new(&FetchSettings::default(), endpoints(server), credentials).unwrap()
}

async fn respond(server: &MockServer, at: &str, cookie: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .and(header("cookie", cookie))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn store_with(temp: &TempDir, records: &[(ContentType, &str)]) -> ArchiveStore {
    let store = ArchiveStore::open(temp.path()).unwrap();
    for (content_type, id) in records {
        fs::write(store.record_path(*content_type, id), "{}").unwrap();
    }
    store
}

/// Classifies everything as censored when its ID is odd.
#[derive(Default)]
struct OddIsCensored {
    calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Classifier for OddIsCensored {
    async fn classify(&self, content_type: ContentType, content_id: &str) -> Result<bool, ProbeError> {
        self.calls
            .lock()
            .unwrap()
            .push(content_type.ledger_key(content_id));
        Ok(content_id.parse::<u64>().map(|id| id % 2 == 1).unwrap_or(false))
    }
}

fn fast_policy(retries: u32) -> BackoffPolicy {
    BackoffPolicy {
        base_delay: Duration::ZERO,
        multiplier: 1,
        max_attempts: retries,
        floor_delay: Duration::ZERO,
        floor_attempts: 0,
    }
}

/// Fails every call with the same remote error.
#[derive(Default)]
struct AlwaysRemoteError {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Classifier for AlwaysRemoteError {
    async fn classify(&self, content_type: ContentType, content_id: &str) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProbeError::Classification {
            target: content_type.ledger_key(content_id),
            source: ClassificationError::Remote(ApiError {
                code: Some(4039),
                message: "rate limited".to_string(),
            }),
        })
    }
}

#[tokio::test]
async fn invalid_first_credential_falls_back_to_second() {
    init_logging();
    let server = MockServer::start().await;
    respond(
        &server,
        "/articles/12",
        "cookie-a",
        401,
        r#"{"error":{"code":10003,"message":"请求参数异常"}}"#,
    )
    .await;
    respond(
        &server,
        "/articles/12",
        "cookie-b",
        200,
        r#"{"id":12,"reaction_instruction":{"REACTION_GOLDEN_SENTENCE_SHARE":"HIDE"}}"#,
    )
    .await;

    let classifier = classifier(&server, &[("COOKIE_A", "cookie-a"), ("COOKIE_B", "cookie-b")]);
    let censored = classifier.classify(ContentType::Article, "12").await.unwrap();
    assert!(censored);
}

#[tokio::test]
async fn empty_credentials_are_skipped_without_a_request() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/answers/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":3}"#))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = classifier(&server, &[("COOKIE_A", ""), ("COOKIE_B", "cookie-b")]);
    assert!(!classifier.classify(ContentType::Answer, "3").await.unwrap());
}

#[tokio::test]
async fn removed_answer_is_censored() {
    init_logging();
    let server = MockServer::start().await;
    let body = format!(r#"{{"error":{{"code":{CONTENT_REMOVED_CODE},"message":"内容已被删除"}}}}"#);
    respond(&server, "/answers/8", "cookie-a", 404, &body).await;

    let classifier = classifier(&server, &[("COOKIE_A", "cookie-a")]);
    assert!(classifier.classify(ContentType::Answer, "8").await.unwrap());
}

#[tokio::test]
async fn every_credential_rejected_is_no_valid_credential() {
    init_logging();
    let server = MockServer::start().await;
    let invalid = r#"{"error":{"code":10003,"message":"invalid"}}"#;
    respond(&server, "/answers/1", "cookie-a", 200, invalid).await;
    respond(&server, "/answers/1", "cookie-b", 200, invalid).await;

    let classifier = classifier(&server, &[("COOKIE_A", "cookie-a"), ("COOKIE_B", "cookie-b")]);
    let err = classifier.classify(ContentType::Answer, "1").await.unwrap_err();
    match err {
        ProbeError::NoValidCredential { last_error } => {
            assert_eq!(last_error.and_then(|error| error.code), Some(10003));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn unexpected_answer_error_fails_and_writes_nothing() {
    init_logging();
    let server = MockServer::start().await;
    respond(
        &server,
        "/answers/1",
        "cookie-a",
        500,
        r#"{"error":{"code":4039,"message":"rate limited"}}"#,
    )
    .await;

    let temp = TempDir::new().unwrap();
    let store = store_with(&temp, &[(ContentType::Answer, "1")]);
    let classifier = classifier(&server, &[("COOKIE_A", "cookie-a")]);
    let probe = CensorshipProbe::new(&classifier, &store).with_throttle(Throttle::none());

    let err = probe.run_once().await.unwrap_err();
    match err {
        ProbeError::Classification { target, source } => {
            assert_eq!(target, "/answer/1");
            let ClassificationError::Remote(remote) = source;
            assert_eq!(remote.code, Some(4039));
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(!temp.path().join(CENSORSHIP_FILE).exists());
}

#[tokio::test]
async fn probe_classifies_answers_then_articles_and_persists_in_order() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = store_with(
        &temp,
        &[
            (ContentType::Article, "20"),
            (ContentType::Answer, "3"),
            (ContentType::Answer, "2"),
        ],
    );
    let classifier = OddIsCensored::default();
    let probe = CensorshipProbe::new(&classifier, &store).with_throttle(Throttle::none());

    let summary = probe.run_once().await.unwrap();
    assert_eq!(summary.classified, 3);
    assert_eq!(summary.censored, 1);
    assert_eq!(
        *classifier.calls.lock().unwrap(),
        vec!["/answer/2", "/answer/3", "/p/20"]
    );
    assert_eq!(
        fs::read_to_string(temp.path().join(CENSORSHIP_FILE)).unwrap(),
        "{\n    \"/answer/2\": false,\n    \"/answer/3\": true,\n    \"/p/20\": false\n}"
    );
}

#[tokio::test]
async fn probe_resumes_from_ledger_after_interrupted_write() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = store_with(&temp, &[(ContentType::Answer, "1"), (ContentType::Answer, "5")]);
    let ledger_path = temp.path().join(CENSORSHIP_FILE);
    fs::write(&ledger_path, "{\n    \"/answer/1\": true\n}").unwrap();
    // Leftover from a writer killed before its rename.
    fs::write(temp.path().join(".tmpCrash1"), "{\n    \"/answer/1\": tr").unwrap();

    let classifier = OddIsCensored::default();
    let probe = CensorshipProbe::new(&classifier, &store).with_throttle(Throttle::none());
    let summary = probe.run_once().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(*classifier.calls.lock().unwrap(), vec!["/answer/5"]);
    let ledger = CensorshipLedger::load(&ledger_path).unwrap();
    assert_eq!(
        ledger.iter().collect::<Vec<_>>(),
        vec![("/answer/1", true), ("/answer/5", true)]
    );
}

#[test]
fn corrupt_ledger_is_reported_not_replaced() {
    let temp = TempDir::new().unwrap();
    let ledger_path = temp.path().join(CENSORSHIP_FILE);
    fs::write(&ledger_path, "{ not json").unwrap();

    assert!(CensorshipLedger::load(&ledger_path).is_err());
    assert_eq!(fs::read_to_string(&ledger_path).unwrap(), "{ not json");
}

#[test]
fn credential_debug_hides_the_cookie() {
    let credential = Credential::new("COOKIE_A", "z_c0=secret");
    let debug = format!("{credential:?}");
    assert!(debug.contains("COOKIE_A"));
    assert!(!debug.contains("secret"));
}

#[tokio::test]
async fn remote_classification_errors_are_not_retried() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = store_with(&temp, &[(ContentType::Answer, "1")]);
    let classifier = AlwaysRemoteError::default();
    let probe = CensorshipProbe::new(&classifier, &store).with_throttle(Throttle::none());

    let err = probe.run(&fast_policy(5)).await.unwrap_err();
    assert!(matches!(err, ProbeError::Classification { .. }));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/answers/1"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error":{"code":10003,"message":"请求参数异常"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let store = store_with(&temp, &[(ContentType::Answer, "1")]);
    let classifier = classifier(&server, &[("COOKIE_A", "cookie-a")]);
    let probe = CensorshipProbe::new(&classifier, &store).with_throttle(Throttle::none());

    let err = probe.run(&fast_policy(5)).await.unwrap_err();
    assert!(matches!(err, ProbeError::NoValidCredential { .. }));
}

#[tokio::test]
async fn transport_failures_are_retried_until_success() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/answers/1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    respond(&server, "/answers/1", "cookie-a", 200, r#"{"id":1}"#).await;

    let temp = TempDir::new().unwrap();
    let store = store_with(&temp, &[(ContentType::Answer, "1")]);
    let classifier = classifier(&server, &[("COOKIE_A", "cookie-a")]);
    let probe = CensorshipProbe::new(&classifier, &store).with_throttle(Throttle::none());

    let summary = probe.run(&fast_policy(3)).await.unwrap();
    assert_eq!(summary.classified, 1);
    let ledger = CensorshipLedger::load(temp.path().join(CENSORSHIP_FILE)).unwrap();
    assert_eq!(ledger.get("/answer/1"), Some(false));
}

#[tokio::test]
async fn oversized_classification_body_is_rejected() {
    init_logging();
    let server = MockServer::start().await;
    let padding = "x".repeat(4096);
    respond(
        &server,
        "/answers/1",
        "cookie-a",
        200,
        &format!(r#"{{"id":1,"padding":"{padding}"}}"#),
    )
    .await;

    let settings = FetchSettings {
        max_bytes: 1024,
        ..FetchSettings::default()
    };
    let classifier = ReqwestClassifier::new(
        &settings,
        endpoints(&server),
        vec![Credential::new("COOKIE_A", "cookie-a")],
    )
    .unwrap();

    let err = classifier
        .classify(ContentType::Answer, "1")
        .await
        .unwrap_err();
    match err {
        ProbeError::Transport { error, .. } => {
            assert!(matches!(error.kind, FailureKind::TooLarge { max_bytes: 1024, .. }));
        }
        other => panic!("unexpected error {other}"),
    }
}
