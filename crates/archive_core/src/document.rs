use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::censorship::{api_error, ApiError};
use crate::path::{ContentType, ANSWER_DOMAIN, ARTICLE_DOMAIN};
use crate::reference::ReferenceEntry;
use crate::site::SearchEntry;

/// Placeholder shown when an article has no column.
pub const NO_COLUMN: &str = "none";
/// Title used for answers whose question metadata is missing.
pub const UNTITLED: &str = "Untitled";
/// Current canonical prefix for author profile links.
pub const PROFILE_PREFIX: &str = "https://www.zhihu.com/people/";

const LEGACY_PROFILE_PREFIXES: &[&str] = &[
    "https://www.zhihu.com/api/v4/people/",
    "http://www.zhihu.com/api/v4/people/",
    "https://api.zhihu.com/people/",
    "http://api.zhihu.com/people/",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("payload is an error envelope ({0})")]
    ErrorEnvelope(ApiError),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub url: String,
    pub avatar_url: String,
    pub headline: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionMeta {
    pub id: String,
    pub title: String,
}

/// Normalized, in-memory view of one archived payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content_type: ContentType,
    pub id: String,
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub image_url: String,
    pub author: Author,
    pub created: Option<i64>,
    pub updated: Option<i64>,
    pub voteup_count: u64,
    pub comment_count: u64,
    pub content: String,
    pub references: Vec<ReferenceEntry>,
    pub question: Option<QuestionMeta>,
    pub column_title: String,
}

impl Document {
    pub fn from_payload(
        content_type: ContentType,
        id: &str,
        payload: &Value,
    ) -> Result<Self, DocumentError> {
        if let Some(error) = api_error(payload) {
            return Err(DocumentError::ErrorEnvelope(error));
        }
        if !payload.is_object() {
            return Err(DocumentError::NotAnObject);
        }
        let content = payload
            .get("content")
            .and_then(Value::as_str)
            .ok_or(DocumentError::MissingField("content"))?
            .to_string();

        let question = payload.get("question").and_then(|question| {
            let id = question.get("id").and_then(scalar_to_string)?;
            Some(QuestionMeta {
                id,
                title: text_field(question, "title"),
            })
        });

        let (title, url, created, updated) = match content_type {
            ContentType::Article => (
                non_empty(text_field(payload, "title")).unwrap_or_else(|| UNTITLED.to_string()),
                format!("{ARTICLE_DOMAIN}/p/{id}"),
                first_timestamp(payload, &["created", "created_time"]),
                first_timestamp(payload, &["updated", "updated_time"]),
            ),
            ContentType::Answer => (
                payload
                    .get("question")
                    .map(|question| text_field(question, "title"))
                    .and_then(non_empty)
                    .unwrap_or_else(|| UNTITLED.to_string()),
                match &question {
                    Some(question) => format!("{ANSWER_DOMAIN}/question/{}/answer/{id}", question.id),
                    None => format!("{ANSWER_DOMAIN}/answer/{id}"),
                },
                first_timestamp(payload, &["created_time", "created"]),
                first_timestamp(payload, &["updated_time", "updated"]),
            ),
        };

        let author = payload
            .get("author")
            .map(|author| Author {
                name: text_field(author, "name"),
                url: normalize_author_url(&text_field(author, "url")),
                avatar_url: text_field(author, "avatar_url"),
                headline: text_field(author, "headline"),
            })
            .unwrap_or_default();

        let column_title = payload
            .get("column")
            .map(|column| text_field(column, "title"))
            .and_then(non_empty)
            .unwrap_or_else(|| NO_COLUMN.to_string());

        Ok(Self {
            content_type,
            id: id.to_string(),
            title,
            url,
            excerpt: text_field(payload, "excerpt"),
            image_url: text_field(payload, "image_url"),
            author,
            created,
            updated,
            voteup_count: count_field(payload, "voteup_count"),
            comment_count: count_field(payload, "comment_count"),
            content,
            references: Vec::new(),
            question,
            column_title,
        })
    }

    /// File name of the rendered page, relative to the output directory.
    pub fn page_filename(&self) -> String {
        format!("{}.html", self.id)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// ISO-8601 creation time, empty when unknown.
    pub fn created_iso(&self) -> String {
        self.created_at()
            .map(|time| time.to_rfc3339())
            .unwrap_or_default()
    }

    /// Calendar date in the `YYYY年MM月DD日` form shown on pages.
    pub fn created_display(&self) -> String {
        self.created_at()
            .map(|time| time.format("%Y年%m月%d日").to_string())
            .unwrap_or_default()
    }

    pub fn created_date(&self) -> String {
        self.created_at()
            .map(|time| time.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    pub fn search_entry(&self, plain_text: String) -> SearchEntry {
        SearchEntry {
            id: self.id.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            excerpt: self.excerpt.clone(),
            plain_text_content: plain_text,
            image: self.image_url.clone(),
            created_timestamp: self.created,
            content_type: self.content_type.dir_name().to_string(),
        }
    }
}

/// Rewrite profile links from older API hosts to the canonical profile prefix.
pub fn normalize_author_url(url: &str) -> String {
    for prefix in LEGACY_PROFILE_PREFIXES {
        if let Some(rest) = url.strip_prefix(prefix) {
            return format!("{PROFILE_PREFIX}{rest}");
        }
    }
    url.to_string()
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn count_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

pub(crate) fn first_timestamp(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| {
        let raw = value.get(*key)?;
        raw.as_i64()
            .or_else(|| raw.as_f64().map(|secs| secs as i64))
            .or_else(|| raw.as_str().and_then(|text| text.trim().parse().ok()))
    })
}
