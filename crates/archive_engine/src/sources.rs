use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use archive_core::{CanonicalPath, LegacyRow, ModernSource, PathError, PathResolver};
use archive_logging::{archive_info, archive_warn};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

/// Header of the link column in current-format exports.
pub const LINK_COLUMN: &str = "链接";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("csv error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("{path} is not a JSON array of paths: {source}")]
    PathList {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Read one current-format export; its name is the file name.
pub fn load_modern_source(path: &Path) -> Result<ModernSource, SourceError> {
    let csv_error = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let column = headers
        .iter()
        .position(|header| header.trim().trim_start_matches('\u{feff}') == LINK_COLUMN)
        .ok_or_else(|| SourceError::MissingColumn {
            path: path.to_path_buf(),
            column: LINK_COLUMN,
        })?;

    let mut links = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if let Some(link) = record.get(column) {
            links.push(link.to_string());
        }
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ModernSource::new(name, links))
}

/// Every `*.csv` export in `dir`, in file-name order. A missing directory yields none.
pub fn load_modern_sources(dir: &Path) -> Result<Vec<ModernSource>, SourceError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            archive_warn!("{:?} does not exist, skipping current-format exports", dir);
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(SourceError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    files.iter().map(|path| load_modern_source(path)).collect()
}

/// Read the header-less `title, link, type` legacy export.
pub fn load_legacy_rows(path: &Path) -> Result<Vec<LegacyRow>, SourceError> {
    let csv_error = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let field = |index| record.get(index).unwrap_or_default().to_string();
        rows.push(LegacyRow {
            title: field(0),
            link: field(1),
            kind: field(2),
        });
    }
    Ok(rows)
}

/// Resolve the full seed list from a downloads directory and an optional legacy export.
pub fn resolve_seed_paths(
    downloads_dir: &Path,
    legacy_export: Option<&Path>,
) -> Result<Vec<CanonicalPath>, SourceError> {
    let mut resolver = PathResolver::new();
    for source in load_modern_sources(downloads_dir)? {
        let count = resolver.add_modern(&source)?;
        archive_info!("{} {}", source.name, count);
    }
    if let Some(legacy) = legacy_export {
        let rows = load_legacy_rows(legacy)?;
        let split = resolver.add_legacy(&rows);
        archive_info!(
            "legacy export: {} answer paths, {} article paths",
            split.answer_paths.len(),
            split.article_paths.len()
        );
    }
    let paths = resolver.resolve();
    archive_info!("resolved {} unique paths", paths.len());
    Ok(paths)
}

pub fn write_path_list(target: &Path, paths: &[CanonicalPath]) -> Result<PathBuf, SourceError> {
    let raw: Vec<&str> = paths.iter().map(CanonicalPath::raw_path).collect();
    let json = serde_json::to_string_pretty(&raw).map_err(|source| SourceError::PathList {
        path: target.to_path_buf(),
        source,
    })?;
    let dir = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let filename = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "paths.json".to_string());
    Ok(AtomicFileWriter::new(dir).write(&filename, json)?)
}

/// Read a path list; order is preserved as written.
pub fn read_path_list(source: &Path) -> Result<Vec<CanonicalPath>, SourceError> {
    let raw = fs::read_to_string(source).map_err(|err| SourceError::Io {
        path: source.to_path_buf(),
        source: err,
    })?;
    let paths: Vec<String> = serde_json::from_str(&raw).map_err(|err| SourceError::PathList {
        path: source.to_path_buf(),
        source: err,
    })?;
    Ok(paths.into_iter().map(CanonicalPath::new).collect())
}
