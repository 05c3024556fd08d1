use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use archive_core::{CanonicalPath, ContentType};
use archive_logging::archive_debug;
use thiserror::Error;

use crate::persist::{append_line, ensure_output_dir, AtomicFileWriter, PersistError};

/// Append-only list of paths confirmed absent, one per line.
pub const NOT_FOUND_FILE: &str = "not_found.txt";

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("record {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// On-disk archive: one payload file per content ID plus the not-found list.
///
/// Layout under the root: `answer/<id>.json`, `article/<id>.json` and
/// `not_found.txt`. Every query goes to disk except the not-found set, which
/// is loaded once and kept in sync with the file on each append.
#[derive(Debug)]
pub struct ArchiveStore {
    root: PathBuf,
    not_found: Mutex<HashSet<String>>,
}

impl ArchiveStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for content_type in ContentType::ALL {
            ensure_output_dir(&root.join(content_type.dir_name()))?;
        }
        let not_found = load_not_found(&root.join(NOT_FOUND_FILE))?;
        archive_debug!(
            "Opened archive at {:?} ({} known not-found paths)",
            root,
            not_found.len()
        );
        Ok(Self {
            root,
            not_found: Mutex::new(not_found),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, content_type: ContentType, content_id: &str) -> PathBuf {
        self.root
            .join(content_type.dir_name())
            .join(format!("{content_id}.{RECORD_EXTENSION}"))
    }

    pub fn has_record(&self, content_type: ContentType, content_id: &str) -> bool {
        self.record_path(content_type, content_id).is_file()
    }

    pub fn is_not_found(&self, raw_path: &str) -> bool {
        self.not_found_set().contains(raw_path)
    }

    pub fn not_found_count(&self) -> usize {
        self.not_found_set().len()
    }

    /// Persist a payload as the record of `path`, replacing any previous one.
    pub fn write_record(&self, path: &CanonicalPath, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let writer = AtomicFileWriter::new(self.root.join(path.content_type().dir_name()));
        let filename = format!("{}.{RECORD_EXTENSION}", path.content_id());
        Ok(writer.write(&filename, bytes)?)
    }

    /// Append `raw_path` to the not-found list. Returns `false` if it was already listed.
    pub fn record_not_found(&self, raw_path: &str) -> Result<bool, StoreError> {
        let mut set = self.not_found_set();
        if set.contains(raw_path) {
            return Ok(false);
        }
        append_line(&self.root.join(NOT_FOUND_FILE), raw_path)?;
        set.insert(raw_path.to_string());
        Ok(true)
    }

    /// IDs of every stored record of one type, ordered by file name.
    pub fn record_ids(&self, content_type: ContentType) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(content_type.dir_name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION))
            .collect();
        files.sort();

        Ok(files
            .iter()
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
            .map(str::to_owned)
            .collect())
    }

    /// IDs of every stored record of any type.
    pub fn archived_ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut ids = HashSet::new();
        for content_type in ContentType::ALL {
            ids.extend(self.record_ids(content_type)?);
        }
        Ok(ids)
    }

    pub fn read_record(
        &self,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<serde_json::Value, StoreError> {
        let path = self.record_path(content_type, content_id);
        let raw = fs::read(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| StoreError::Malformed { path, source })
    }

    fn not_found_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.not_found
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_not_found(path: &Path) -> Result<HashSet<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
