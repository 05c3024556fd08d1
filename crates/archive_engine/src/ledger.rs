use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

/// File name of the censorship ledger inside the data directory.
pub const CENSORSHIP_FILE: &str = "censorship.json";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("ledger {path} is not a JSON object of booleans: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Ordered `key -> censored` mapping, written through on every update.
///
/// Insertion order is part of the output. Entries are only ever added; the
/// file is replaced atomically so a reader sees either the previous or the
/// next complete ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensorshipLedger {
    path: PathBuf,
    entries: IndexMap<String, bool>,
}

impl CensorshipLedger {
    /// Load the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => IndexMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| LedgerError::Malformed {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => IndexMap::new(),
            Err(source) => return Err(LedgerError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Record one classification and persist the whole ledger before returning.
    pub fn record(&mut self, key: impl Into<String>, censored: bool) -> Result<(), LedgerError> {
        self.entries.insert(key.into(), censored);
        self.save()
    }

    pub fn save(&self) -> Result<(), LedgerError> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.entries
            .serialize(&mut serializer)
            .map_err(|source| LedgerError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| CENSORSHIP_FILE.to_string());
        AtomicFileWriter::new(dir).write(&filename, buffer)?;
        Ok(())
    }
}
