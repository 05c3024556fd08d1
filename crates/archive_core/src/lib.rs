//! Archive core: pure path, scheduling, classification, document and statistics logic.
mod backoff;
mod censorship;
mod document;
mod ordinal;
mod path;
mod reference;
mod site;
mod stats;
mod template;
mod throttle;

pub use backoff::BackoffPolicy;
pub use censorship::{
    api_error, classify_answer, classify_article, ApiError, ClassificationError,
    CONTENT_REMOVED_CODE, INVALID_CREDENTIAL_CODE, RESTRICTED_ARTICLE_FLAG,
};
pub use document::{
    normalize_author_url, Author, Document, DocumentError, QuestionMeta, NO_COLUMN,
    PROFILE_PREFIX, UNTITLED,
};
pub use ordinal::OrdinalKey;
pub use path::{
    infer_base_domain, split_legacy, BaseDomain, CanonicalPath, ContentType, LegacyRow,
    LegacySplit, ModernSource, PathError, PathResolver, PathSortKey, ANSWER_DOMAIN,
    ARTICLE_DOMAIN,
};
pub use reference::{ReferenceCollector, ReferenceEntry};
pub use site::{SearchEntry, SiteAccumulator};
pub use stats::{
    count_characters, record_year, render_report, year_fields, ArchiveStats, YearTotal,
    YearlyTotals,
};
pub use template::{PageTemplate, TemplateError, TemplateFields};
pub use throttle::Throttle;
