use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::ordinal::OrdinalKey;

/// Host prefix stripped from article links.
pub const ARTICLE_DOMAIN: &str = "https://zhuanlan.zhihu.com";
/// Host prefix stripped from answer links.
pub const ANSWER_DOMAIN: &str = "https://www.zhihu.com";

const ARTICLE_HOST: &str = "zhuanlan.zhihu.com";
const ANSWER_HOST: &str = "www.zhihu.com";

/// Question prefix carried by legacy answer links: `https://www.zhihu.com/question/<digits>`.
static LEGACY_QUESTION_PREFIX: OnceLock<Regex> = OnceLock::new();

fn legacy_question_prefix() -> &'static Regex {
    LEGACY_QUESTION_PREFIX.get_or_init(|| {
        Regex::new(r"https://www\.zhihu\.com/question/[0-9]+")
            .expect("legacy question prefix pattern should compile")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentType {
    Answer,
    Article,
}

impl ContentType {
    /// Processing order used by every stage that walks both types.
    pub const ALL: [ContentType; 2] = [ContentType::Answer, ContentType::Article];

    /// Name of the storage directory holding payloads of this type.
    pub fn dir_name(self) -> &'static str {
        match self {
            ContentType::Answer => "answer",
            ContentType::Article => "article",
        }
    }

    /// Canonical key of one item of this type, as used by the censorship ledger.
    pub fn ledger_key(self, content_id: &str) -> String {
        match self {
            ContentType::Answer => format!("/answer/{content_id}"),
            ContentType::Article => format!("/p/{content_id}"),
        }
    }

    /// Answers are recognised by a literal `answer` path segment.
    pub fn from_path(raw_path: &str) -> Self {
        if raw_path.split('/').any(|segment| segment == "answer") {
            ContentType::Answer
        } else {
            ContentType::Article
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Domain-stripped relative path identifying one content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPath {
    content_type: ContentType,
    content_id: String,
    raw_path: String,
}

impl CanonicalPath {
    pub fn new(raw_path: impl Into<String>) -> Self {
        let raw_path = raw_path.into();
        let content_id = raw_path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            content_type: ContentType::from_path(&raw_path),
            content_id,
            raw_path,
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// `(parent segment, trailing id)` with the id compared numerically when possible.
    pub fn sort_key(&self) -> PathSortKey {
        let mut segments = self.raw_path.rsplit('/');
        let last = segments.next().unwrap_or_default();
        let group = segments.next().unwrap_or_default();
        PathSortKey {
            group: group.to_string(),
            id: OrdinalKey::parse(last),
        }
    }
}

impl PartialOrd for CanonicalPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.raw_path.cmp(&other.raw_path))
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathSortKey {
    pub group: String,
    pub id: OrdinalKey,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("cannot determine base domain for source {source_name}")]
    AmbiguousSource { source_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDomain {
    Article,
    Answer,
}

impl BaseDomain {
    pub fn prefix(self) -> &'static str {
        match self {
            BaseDomain::Article => ARTICLE_DOMAIN,
            BaseDomain::Answer => ANSWER_DOMAIN,
        }
    }
}

/// Classify a modern export by its file name, falling back to a sample link.
pub fn infer_base_domain(
    source_name: &str,
    sample_link: Option<&str>,
) -> Result<BaseDomain, PathError> {
    let name = source_name.to_lowercase();
    if name.contains("-article-") {
        return Ok(BaseDomain::Article);
    }
    if name.contains("-answer-") {
        return Ok(BaseDomain::Answer);
    }
    if let Some(link) = sample_link {
        let host = Url::parse(link.trim())
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned));
        match host.as_deref() {
            Some(ARTICLE_HOST) => return Ok(BaseDomain::Article),
            Some(ANSWER_HOST) => return Ok(BaseDomain::Answer),
            _ => {}
        }
        if link.contains(ARTICLE_HOST) {
            return Ok(BaseDomain::Article);
        }
        if link.contains(ANSWER_HOST) {
            return Ok(BaseDomain::Answer);
        }
    }
    Err(PathError::AmbiguousSource {
        source_name: source_name.to_string(),
    })
}

/// One current-format export: a named list of absolute links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModernSource {
    pub name: String,
    pub links: Vec<String>,
}

impl ModernSource {
    pub fn new(name: impl Into<String>, links: Vec<String>) -> Self {
        Self {
            name: name.into(),
            links,
        }
    }

    pub fn sample_link(&self) -> Option<&str> {
        self.links
            .iter()
            .map(|link| link.trim())
            .find(|link| !link.is_empty())
    }

    /// Links with the source's base domain removed.
    pub fn paths(&self) -> Result<Vec<String>, PathError> {
        let base = infer_base_domain(&self.name, self.sample_link())?;
        Ok(self
            .links
            .iter()
            .map(|link| link.trim())
            .filter(|link| !link.is_empty())
            .map(|link| link.replace(base.prefix(), ""))
            .collect())
    }
}

/// One row of the legacy `title, link, type` export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRow {
    pub title: String,
    pub link: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacySplit {
    pub answer_paths: Vec<String>,
    pub article_paths: Vec<String>,
}

/// Split legacy rows by their type column; unknown types are dropped.
pub fn split_legacy(rows: &[LegacyRow]) -> LegacySplit {
    let mut split = LegacySplit::default();
    for row in rows {
        let link = row.link.trim();
        if link.is_empty() {
            continue;
        }
        match row.kind.trim() {
            "answer" => split
                .answer_paths
                .push(legacy_question_prefix().replace_all(link, "").into_owned()),
            "post" => split.article_paths.push(link.replace(ARTICLE_DOMAIN, "")),
            _ => {}
        }
    }
    split
}

/// Accumulates paths from every source and yields them deduplicated and sorted.
#[derive(Debug, Default)]
pub struct PathResolver {
    seen: HashSet<String>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of paths the source contributed before dedup.
    pub fn add_modern(&mut self, source: &ModernSource) -> Result<usize, PathError> {
        let paths = source.paths()?;
        let count = paths.len();
        self.add_paths(paths);
        Ok(count)
    }

    pub fn add_legacy(&mut self, rows: &[LegacyRow]) -> LegacySplit {
        let split = split_legacy(rows);
        self.add_paths(split.answer_paths.iter().cloned());
        self.add_paths(split.article_paths.iter().cloned());
        split
    }

    pub fn add_paths<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !path.is_empty() {
                self.seen.insert(path);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn resolve(self) -> Vec<CanonicalPath> {
        let mut paths: Vec<CanonicalPath> = self.seen.into_iter().map(CanonicalPath::new).collect();
        paths.sort();
        paths
    }
}
