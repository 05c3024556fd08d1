use std::env;
use std::path::PathBuf;

/// Points at a directory whose `.env` is read when none is found in the working tree.
pub const ARCHIVE_HOME_VAR: &str = "ARCHIVE_HOME";

fn fallback_dotenv_path(archive_home: Option<PathBuf>) -> Option<PathBuf> {
    Some(archive_home?.join(".env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let Some(path) = fallback_dotenv_path(env::var_os(ARCHIVE_HOME_VAR).map(PathBuf::from)) else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
