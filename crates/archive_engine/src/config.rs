use std::path::PathBuf;

use archive_core::{BackoffPolicy, Throttle};
use thiserror::Error;

use crate::fetch::FetchSettings;
use crate::ledger::CENSORSHIP_FILE;
use crate::probe::{Credential, ProbeEndpoints};

pub const API_VAR: &str = "API";
pub const ANSWER_PROBE_BASE_VAR: &str = "ANSWER_PROBE_BASE";
pub const ARTICLE_PROBE_BASE_VAR: &str = "ARTICLE_PROBE_BASE";
pub const DATA_DIR_VAR: &str = "ARCHIVE_DATA_DIR";
/// Credential variables, in the order they are tried.
pub const CREDENTIAL_VARS: [&str; 2] = ["COOKIE_A", "COOKIE_B"];

pub const DEFAULT_DATA_DIR: &str = ".";
pub const PATH_LIST_FILE: &str = "paths.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting `{0}` is not set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub data_dir: PathBuf,
    /// Base URL that canonical paths are appended to when fetching.
    pub api_base: String,
    pub probe_endpoints: ProbeEndpoints,
    pub credentials: Vec<Credential>,
    pub fetch: FetchSettings,
    pub fetch_throttle: Throttle,
    pub probe_throttle: Throttle,
    pub backoff: BackoffPolicy,
}

impl ArchiveConfig {
    /// Build a configuration from named settings; `lookup` is the environment in production.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_base = value(API_VAR).ok_or(ConfigError::Missing(API_VAR))?;
        let defaults = ProbeEndpoints::default();
        let probe_endpoints = ProbeEndpoints {
            answer_base: value(ANSWER_PROBE_BASE_VAR).unwrap_or(defaults.answer_base),
            article_base: value(ARTICLE_PROBE_BASE_VAR).unwrap_or(defaults.article_base),
        };
        let credentials: Vec<Credential> = CREDENTIAL_VARS
            .iter()
            .map(|name| Credential::new(*name, lookup(*name).unwrap_or_default()))
            .collect();
        let fetch = FetchSettings {
            credential: credentials
                .iter()
                .find(|credential| !credential.is_empty())
                .map(|credential| credential.value().to_string()),
            ..FetchSettings::default()
        };

        Ok(Self {
            data_dir: PathBuf::from(value(DATA_DIR_VAR).unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            api_base,
            probe_endpoints,
            credentials,
            fetch,
            fetch_throttle: Throttle::for_fetch(),
            probe_throttle: Throttle::for_probe(),
            backoff: BackoffPolicy::default(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(CENSORSHIP_FILE)
    }

    pub fn path_list(&self) -> PathBuf {
        self.data_dir.join(PATH_LIST_FILE)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Drop every delay; for tests and dry runs against local servers.
    pub fn without_delays(mut self) -> Self {
        self.fetch_throttle = Throttle::none();
        self.probe_throttle = Throttle::none();
        self.backoff = BackoffPolicy::none();
        self
    }
}
