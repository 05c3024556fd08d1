use std::path::PathBuf;

use archive_core::ContentType;
use clap::{Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(
    name = "archiver",
    about = "Incrementally archive answers and articles and publish them as a static site"
)]
pub struct Cli {
    /// Directory holding records and ledgers. Overrides ARCHIVE_DATA_DIR.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    pub log_level: LevelFilter,

    /// Log to the terminal only, without writing archiver.log.
    #[arg(long, global = true, default_value_t = false)]
    pub no_log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Turn seed exports into the sorted path list.
    Resolve {
        /// Directory of current-format CSV exports, relative to the data directory.
        #[arg(long, default_value = "downloads")]
        downloads: PathBuf,
        /// Header-less legacy export.
        #[arg(long)]
        legacy: Option<PathBuf>,
        /// Where to write the path list. Defaults to paths.json in the data directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fetch every listed path that is neither archived nor known missing.
    Fetch {
        /// Path list to read. Defaults to paths.json in the data directory.
        #[arg(long)]
        paths: Option<PathBuf>,
        /// Run one batch and stop at the first fatal failure.
        #[arg(long, default_value_t = false)]
        no_retry: bool,
    },
    /// Classify archived items missing from the censorship ledger.
    Probe {
        #[arg(long, default_value_t = false)]
        no_retry: bool,
    },
    /// Render the archive as static HTML.
    Publish {
        /// Output directory, relative to the data directory.
        #[arg(long, default_value = "html")]
        output: PathBuf,
        /// Absolute base URL used in sitemap.txt.
        #[arg(long)]
        site_url: Option<String>,
    },
    /// Print per-year character and item totals of the archive.
    Stats {
        /// Content type to include (answer or article). Repeat for both; defaults to both.
        #[arg(long = "type", value_parser = parse_content_type)]
        types: Vec<ContentType>,
    },
}

fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    raw.parse()
        .map_err(|_| format!("unknown log level `{raw}`"))
}

fn parse_content_type(raw: &str) -> Result<ContentType, String> {
    ContentType::ALL
        .into_iter()
        .find(|content_type| content_type.dir_name() == raw)
        .ok_or_else(|| format!("unknown content type `{raw}` (expected answer or article)"))
}
