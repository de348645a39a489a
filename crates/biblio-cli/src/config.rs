//! CLI configuration file handling.
//!
//! The config file is optional: with no file, everything falls back to
//! the core defaults and a `library.db` in the working directory.

use std::path::{Path, PathBuf};

use biblio_core::LibraryConfig;
use rust_decimal::Decimal;
use serde::Deserialize;

/// On-disk TOML config: `[library]` overrides the lending rules,
/// `[database]` points at the SQLite file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct LibrarySection {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub loan_period_days: Option<i64>,
    pub max_books_per_member: Option<u32>,
    pub penalty_rate: Option<Decimal>,
    pub max_penalty: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

/// Resolved settings: lending rules plus an optional database path.
pub struct Settings {
    pub library: LibraryConfig,
    pub database_path: Option<PathBuf>,
}

/// Load settings, merging the config file (if any) over the defaults.
pub fn load(path: Option<&Path>) -> anyhow::Result<Settings> {
    let file = match path {
        Some(p) => read_config(p)?,
        None => FileConfig::default(),
    };

    let mut library = LibraryConfig::default();
    if let Some(value) = file.library.name {
        library.library_name = value;
    }
    if let Some(value) = file.library.domain {
        library.domain = value;
    }
    if let Some(value) = file.library.loan_period_days {
        library.loan_period_days = value;
    }
    if let Some(value) = file.library.max_books_per_member {
        library.max_books_per_member = value;
    }
    if let Some(value) = file.library.penalty_rate {
        library.penalty_rate = value;
    }
    if let Some(value) = file.library.max_penalty {
        library.max_penalty = value;
    }

    Ok(Settings {
        library,
        database_path: file.database.path,
    })
}

fn read_config(path: &Path) -> anyhow::Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}
