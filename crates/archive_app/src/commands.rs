use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use archive_core::{render_report, BackoffPolicy, ContentType};
use archive_engine::{
    collect_stats, read_path_list, resolve_seed_paths, write_path_list, ArchiveConfig,
    ArchiveStore, Archiver, CensorshipProbe, ReqwestClassifier, ReqwestFetcher, SiteAssembler,
    DATA_DIR_VAR, DEFAULT_DATA_DIR, PATH_LIST_FILE,
};
use archive_logging::archive_info;

use crate::progress::LogProgressSink;

/// Data directory from the command line, then the environment, then the working directory.
pub fn data_dir(cli_value: Option<PathBuf>) -> PathBuf {
    cli_value
        .or_else(|| env::var_os(DATA_DIR_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn load_config(data_dir: PathBuf) -> Result<ArchiveConfig> {
    Ok(ArchiveConfig::from_env()
        .context("reading configuration from the environment")?
        .with_data_dir(data_dir))
}

fn policy(config: &ArchiveConfig, no_retry: bool) -> BackoffPolicy {
    if no_retry {
        BackoffPolicy::none()
    } else {
        config.backoff.clone()
    }
}

pub fn resolve(
    data_dir: &Path,
    downloads: &Path,
    legacy: Option<&Path>,
    output: Option<PathBuf>,
) -> Result<()> {
    let downloads = data_dir.join(downloads);
    let legacy = legacy.map(|legacy| data_dir.join(legacy));
    let paths = resolve_seed_paths(&downloads, legacy.as_deref())
        .with_context(|| format!("resolving seed exports in {}", downloads.display()))?;

    let target = output.unwrap_or_else(|| data_dir.join(PATH_LIST_FILE));
    let written = write_path_list(&target, &paths)
        .with_context(|| format!("writing {}", target.display()))?;
    archive_info!("wrote {} paths to {:?}", paths.len(), written);
    Ok(())
}

pub async fn fetch(config: &ArchiveConfig, paths: Option<PathBuf>, no_retry: bool) -> Result<()> {
    let list = paths.unwrap_or_else(|| config.path_list());
    let paths = read_path_list(&list).with_context(|| format!("reading {}", list.display()))?;
    let store = ArchiveStore::open(&config.data_dir)
        .with_context(|| format!("opening archive at {}", config.data_dir.display()))?;
    let fetcher = ReqwestFetcher::new(config.fetch.clone()).context("building HTTP client")?;
    let sink = LogProgressSink;

    let archiver = Archiver::new(&fetcher, &store, config.api_base.clone())
        .with_throttle(config.fetch_throttle)
        .with_sink(&sink);
    let summary = archiver
        .run(&paths, &policy(config, no_retry))
        .await
        .context("fetch did not complete")?;
    archive_info!(
        "fetch finished: {} new, {} not found, {} already archived, {} known missing",
        summary.fetched,
        summary.not_found,
        summary.skipped_archived,
        summary.skipped_not_found
    );
    Ok(())
}

pub async fn probe(config: &ArchiveConfig, no_retry: bool) -> Result<()> {
    let store = ArchiveStore::open(&config.data_dir)
        .with_context(|| format!("opening archive at {}", config.data_dir.display()))?;
    let classifier = ReqwestClassifier::new(
        &config.fetch,
        config.probe_endpoints.clone(),
        config.credentials.clone(),
    )
    .context("building HTTP client")?;
    let sink = LogProgressSink;

    let probe = CensorshipProbe::new(&classifier, &store)
        .with_ledger_path(config.ledger_path())
        .with_throttle(config.probe_throttle)
        .with_sink(&sink);
    let summary = probe
        .run(&policy(config, no_retry))
        .await
        .context("censorship probe did not complete")?;
    archive_info!(
        "probe finished: {} classified, {} censored, {} already known",
        summary.classified,
        summary.censored,
        summary.skipped
    );
    Ok(())
}

pub fn publish(data_dir: &Path, output: &Path, site_url: Option<String>) -> Result<()> {
    let store = ArchiveStore::open(data_dir)
        .with_context(|| format!("opening archive at {}", data_dir.display()))?;
    let mut assembler = SiteAssembler::new(&store, output)?;
    if let Some(site_url) = site_url {
        assembler = assembler.with_site_url(site_url);
    }
    let summary = assembler
        .publish()
        .with_context(|| format!("publishing to {}", output.display()))?;
    archive_info!(
        "published {} pages ({} skipped) to {:?}",
        summary.pages,
        summary.skipped,
        summary.output_dir
    );
    Ok(())
}

/// Renders the yearly totals; every type is included when `types` is empty.
pub fn stats(data_dir: &Path, types: &[ContentType]) -> Result<String> {
    let types = if types.is_empty() {
        &ContentType::ALL[..]
    } else {
        types
    };
    let store = ArchiveStore::open(data_dir)
        .with_context(|| format!("opening archive at {}", data_dir.display()))?;
    let collected = collect_stats(&store, types).context("collecting statistics")?;
    if collected.skipped > 0 {
        archive_info!("{} records skipped", collected.skipped);
    }
    Ok(render_report(&collected.stats, types))
}
