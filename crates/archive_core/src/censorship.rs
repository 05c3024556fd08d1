use serde_json::Value;
use thiserror::Error;

/// Error code the answer endpoint returns for removed content.
pub const CONTENT_REMOVED_CODE: i64 = 4041;
/// Error code returned when the session credential is rejected.
pub const INVALID_CREDENTIAL_CODE: i64 = 10003;
/// Instruction flag present on restricted articles.
pub const RESTRICTED_ARTICLE_FLAG: &str = "REACTION_GOLDEN_SENTENCE_SHARE";

/// Error envelope carried in a remote response under `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: Option<i64>,
    pub message: String,
}

impl ApiError {
    pub fn is_invalid_credential(&self) -> bool {
        self.code == Some(INVALID_CREDENTIAL_CODE)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "code {code}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Extract the error envelope of a response, if any.
///
/// A missing, `null`, or `false` error field means the response is clean.
pub fn api_error(response: &Value) -> Option<ApiError> {
    let error = response.get("error")?;
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::Object(fields) => Some(ApiError {
            code: fields.get("code").and_then(Value::as_i64),
            message: fields
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => Some(ApiError {
            code: None,
            message: other.to_string(),
        }),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("classification endpoint returned an unexpected error ({0})")]
    Remote(ApiError),
}

/// Answers are censored exactly when the endpoint reports them removed.
pub fn classify_answer(response: &Value) -> Result<bool, ClassificationError> {
    match api_error(response) {
        None => Ok(false),
        Some(error) if error.code == Some(CONTENT_REMOVED_CODE) => Ok(true),
        Some(error) => Err(ClassificationError::Remote(error)),
    }
}

/// Articles are censored when the restriction instruction flag is set.
pub fn classify_article(response: &Value) -> Result<bool, ClassificationError> {
    if let Some(error) = api_error(response) {
        return Err(ClassificationError::Remote(error));
    }
    let flag = response
        .get("reaction_instruction")
        .and_then(|instructions| instructions.get(RESTRICTED_ARTICLE_FLAG));
    Ok(is_truthy(flag))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
    }
}
