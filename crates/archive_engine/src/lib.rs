//! Archive engine: fetching, persistence, censorship probing, statistics and site publishing.
mod archiver;
mod config;
mod fetch;
mod ledger;
mod persist;
mod probe;
mod retry;
mod site;
mod sources;
mod stats;
mod store;
mod transform;
mod types;

pub use archiver::{ArchiveError, Archiver, BatchSummary};
pub use config::{
    ArchiveConfig, ConfigError, ANSWER_PROBE_BASE_VAR, API_VAR, ARTICLE_PROBE_BASE_VAR,
    CREDENTIAL_VARS, DATA_DIR_VAR, DEFAULT_DATA_DIR, PATH_LIST_FILE,
};
pub use fetch::{
    FetchSettings, Fetcher, NullProgressSink, ProgressSink, ReqwestFetcher, BROWSER_USER_AGENT,
};
pub use ledger::{CensorshipLedger, LedgerError, CENSORSHIP_FILE};
pub use persist::{append_line, ensure_output_dir, AtomicFileWriter, PersistError};
pub use probe::{
    CensorshipProbe, Classifier, Credential, ProbeEndpoints, ProbeError, ProbeSummary,
    ReqwestClassifier, DEFAULT_ANSWER_PROBE_BASE, DEFAULT_ARTICLE_PROBE_BASE,
};
pub use retry::{run_with_backoff, run_with_backoff_if};
pub use site::{
    render_summary, PublishError, PublishSummary, SiteAssembler, PAGE_TEMPLATE,
    SEARCH_INDEX_FILE, SITEMAP_FILE, SUMMARY_FILE,
};
pub use sources::{
    load_legacy_rows, load_modern_source, load_modern_sources, read_path_list,
    resolve_seed_paths, write_path_list, SourceError, LINK_COLUMN,
};
pub use stats::{collect_stats, CollectedStats};
pub use store::{ArchiveStore, StoreError, NOT_FOUND_FILE};
pub use transform::{
    escape_html, plain_text, reference_anchor, render_references, trailing_segment,
    unwrap_redirect, ContentTransformer, TransformedContent, REDIRECT_HOST,
};
pub use types::{
    ArchiveEvent, FailureKind, FetchError, FetchMetadata, FetchOutcome, FetchOutput, SkipReason,
};
