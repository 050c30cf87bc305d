use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::lens::Mount;

/// A hand-maintained CSV of lenses from makers without an extractor.
#[derive(Debug, Clone, Deserialize)]
pub struct CuratedSource {
    pub path: PathBuf,
    pub mount: Mount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub overrides_path: Option<PathBuf>,
    #[serde(default)]
    pub curated: Vec<CuratedSource>,
}

impl Settings {
    /// Defaults, then `lensdb.toml` if present, then `LENSDB_*` variables.
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("db_path", "data/lens.sqlite")?
            .set_default("json_path", "lens_data.json")?
            .set_default("csv_path", "lens_data.csv")?
            .set_default(
                "user_agent",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) lensdb/0.1",
            )?
            .set_default("timeout_secs", 30)?
            .add_source(File::with_name("lensdb").required(false))
            .add_source(Environment::with_prefix("LENSDB"))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }
}
