use std::fmt;

/// Result of one payload request.
///
/// Every call yields exactly one variant and the caller matches all three:
/// a payload to persist, a permanent not-found, or a failure that aborts the
/// current batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Payload(FetchOutput),
    NotFound,
    Fatal(FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    AccessDenied,
    HttpStatus(u16),
    ErrorEnvelope { code: Option<i64> },
    MalformedPayload,
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::AccessDenied => write!(f, "access denied"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::ErrorEnvelope { code: Some(code) } => {
                write!(f, "error envelope with code {code}")
            }
            FailureKind::ErrorEnvelope { code: None } => write!(f, "error envelope"),
            FailureKind::MalformedPayload => write!(f, "malformed payload"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyArchived,
    KnownNotFound,
}

/// Progress notifications emitted by the archiver and the censorship probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    Fetched { path: String, bytes: u64 },
    NotFound { path: String },
    Skipped { path: String, reason: SkipReason },
    Classified { key: String, censored: bool },
}
