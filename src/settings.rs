use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_LISTING_URL: &str =
    "https://ranking-empresas.eleconomista.es/ranking_empresas_nacional.html";
pub const DEFAULT_CIF_LOOKUP_BASE: &str = "https://www.datoscif.es/empresa";

/// Runtime settings, built once in `main` and passed down by reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub listing_url: String,
    pub cif_lookup_base: String,
    pub output_path: PathBuf,
    pub database_path: PathBuf,
    pub wait_timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    /// Defaults overlaid with `EBITDA_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_environment(Environment::with_prefix("EBITDA"))
    }

    fn from_environment(env: Environment) -> Result<Self> {
        Config::builder()
            .set_default("listing_url", DEFAULT_LISTING_URL)?
            .set_default("cif_lookup_base", DEFAULT_CIF_LOOKUP_BASE)?
            .set_default("output_path", "data/companies.csv")?
            .set_default("database_path", "data/companies.sqlite")?
            .set_default("wait_timeout_secs", 10)?
            .set_default(
                "user_agent",
                concat!("ebitda-tracker/", env!("CARGO_PKG_VERSION")),
            )?
            .add_source(env)
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
