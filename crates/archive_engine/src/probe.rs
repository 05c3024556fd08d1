use std::fmt;
use std::path::PathBuf;

use archive_core::{
    api_error, classify_answer, classify_article, ApiError, BackoffPolicy, ClassificationError,
    ContentType, Throttle,
};
use archive_logging::{archive_debug, archive_info, archive_warn};
use reqwest::header::COOKIE;
use serde_json::Value;
use thiserror::Error;

use crate::fetch::{map_reqwest_error, read_body, FetchSettings, NullProgressSink, ProgressSink};
use crate::ledger::{CensorshipLedger, LedgerError, CENSORSHIP_FILE};
use crate::retry::run_with_backoff_if;
use crate::store::{ArchiveStore, StoreError};
use crate::{ArchiveEvent, FailureKind, FetchError};

static NULL_SINK: NullProgressSink = NullProgressSink;

pub const DEFAULT_ANSWER_PROBE_BASE: &str = "https://www.zhihu.com/api/v4/answers/";
pub const DEFAULT_ARTICLE_PROBE_BASE: &str = "https://www.zhihu.com/api/v4/articles/";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(
        "no credential produced a usable response{}",
        .last_error.as_ref().map(|err| format!(" (last: {err})")).unwrap_or_default()
    )]
    NoValidCredential { last_error: Option<ApiError> },
    #[error("classifying {target}: {source}")]
    Classification {
        target: String,
        source: ClassificationError,
    },
    #[error("requesting {url}: {error}")]
    Transport { url: String, error: FetchError },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProbeError {
    /// Whether a later run could succeed with the same credentials and ledger.
    ///
    /// Rejected credentials, unexpected remote errors and a corrupt ledger
    /// fail the same way every time and are returned at once.
    pub fn is_transient(&self) -> bool {
        match self {
            ProbeError::Transport { .. } => true,
            ProbeError::Ledger(LedgerError::Malformed { .. }) => false,
            ProbeError::Ledger(_) | ProbeError::Store(_) => true,
            ProbeError::NoValidCredential { .. } | ProbeError::Classification { .. } => false,
        }
    }
}

/// Named session cookie. The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    value: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Classification endpoints; the content ID is appended to the base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEndpoints {
    pub answer_base: String,
    pub article_base: String,
}

impl Default for ProbeEndpoints {
    fn default() -> Self {
        Self {
            answer_base: DEFAULT_ANSWER_PROBE_BASE.to_string(),
            article_base: DEFAULT_ARTICLE_PROBE_BASE.to_string(),
        }
    }
}

impl ProbeEndpoints {
    pub fn url_for(&self, content_type: ContentType, content_id: &str) -> String {
        let base = match content_type {
            ContentType::Answer => &self.answer_base,
            ContentType::Article => &self.article_base,
        };
        format!("{base}{content_id}")
    }
}

#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Whether the item has been censored.
    async fn classify(&self, content_type: ContentType, content_id: &str) -> Result<bool, ProbeError>;
}

/// Queries the live classification endpoints, trying credentials in order.
#[derive(Debug, Clone)]
pub struct ReqwestClassifier {
    client: reqwest::Client,
    endpoints: ProbeEndpoints,
    credentials: Vec<Credential>,
    max_bytes: u64,
}

impl ReqwestClassifier {
    pub fn new(
        settings: &FetchSettings,
        endpoints: ProbeEndpoints,
        credentials: Vec<Credential>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: settings.build_client()?,
            endpoints,
            credentials,
            max_bytes: settings.max_bytes,
        })
    }

    /// First response not rejected as an invalid credential, whatever its status.
    pub async fn query(&self, url: &str) -> Result<Value, ProbeError> {
        let mut last_error = None;
        for credential in &self.credentials {
            if credential.is_empty() {
                archive_debug!("credential {} is empty, skipping", credential.name);
                continue;
            }

            let response = self
                .client
                .get(url)
                .header(COOKIE, credential.value())
                .send()
                .await
                .map_err(|err| ProbeError::Transport {
                    url: url.to_string(),
                    error: map_reqwest_error(err),
                })?;
            let body = read_body(response, self.max_bytes)
                .await
                .map_err(|error| ProbeError::Transport {
                    url: url.to_string(),
                    error,
                })?;
            let payload: Value =
                serde_json::from_slice(&body).map_err(|err| ProbeError::Transport {
                    url: url.to_string(),
                    error: FetchError::new(FailureKind::MalformedPayload, err.to_string()),
                })?;

            match api_error(&payload) {
                Some(error) if error.is_invalid_credential() => {
                    archive_warn!(
                        "credential {} rejected for {}: {}",
                        credential.name,
                        url,
                        error
                    );
                    last_error = Some(error);
                }
                _ => return Ok(payload),
            }
        }
        Err(ProbeError::NoValidCredential { last_error })
    }
}

#[async_trait::async_trait]
impl Classifier for ReqwestClassifier {
    async fn classify(&self, content_type: ContentType, content_id: &str) -> Result<bool, ProbeError> {
        let url = self.endpoints.url_for(content_type, content_id);
        let payload = self.query(&url).await?;
        let verdict = match content_type {
            ContentType::Answer => classify_answer(&payload),
            ContentType::Article => classify_article(&payload),
        };
        verdict.map_err(|source| ProbeError::Classification {
            target: content_type.ledger_key(content_id),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub classified: usize,
    pub censored: usize,
    pub skipped: usize,
}

/// Classifies every archived record missing from the censorship ledger.
pub struct CensorshipProbe<'a> {
    classifier: &'a dyn Classifier,
    store: &'a ArchiveStore,
    ledger_path: PathBuf,
    throttle: Throttle,
    sink: &'a dyn ProgressSink,
}

impl<'a> CensorshipProbe<'a> {
    pub fn new(classifier: &'a dyn Classifier, store: &'a ArchiveStore) -> Self {
        Self {
            classifier,
            store,
            ledger_path: store.root().join(CENSORSHIP_FILE),
            throttle: Throttle::for_probe(),
            sink: &NULL_SINK,
        }
    }

    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    /// One pass: answers then articles, each in file-name order.
    ///
    /// The ledger is re-read from disk on entry and saved after every
    /// classification, so an aborted pass loses nothing already classified.
    pub async fn run_once(&self) -> Result<ProbeSummary, ProbeError> {
        let mut ledger = CensorshipLedger::load(&self.ledger_path)?;
        let mut summary = ProbeSummary::default();
        archive_info!("censorship ledger has {} entries", ledger.len());

        for content_type in ContentType::ALL {
            for content_id in self.store.record_ids(content_type)? {
                let key = content_type.ledger_key(&content_id);
                if ledger.contains(&key) {
                    summary.skipped += 1;
                    continue;
                }

                let censored = self.classifier.classify(content_type, &content_id).await?;
                ledger.record(key.clone(), censored)?;
                summary.classified += 1;
                if censored {
                    summary.censored += 1;
                }
                archive_debug!("{} censored={}", key, censored);
                self.sink.emit(ArchiveEvent::Classified { key, censored });

                tokio::time::sleep(self.throttle.sample()).await;
            }
        }

        archive_info!(
            "probe done: {} classified ({} censored), {} already known",
            summary.classified,
            summary.censored,
            summary.skipped
        );
        Ok(summary)
    }

    /// Repeats the pass per `policy`, but only for transient failures.
    pub async fn run(&self, policy: &BackoffPolicy) -> Result<ProbeSummary, ProbeError> {
        run_with_backoff_if(
            policy,
            "censorship probe",
            || self.run_once(),
            ProbeError::is_transient,
        )
        .await
    }
}
