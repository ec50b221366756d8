use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

const CONFIG_ENV: &str = "LINEPACE_CONFIG";
const DB_ENV: &str = "LINEPACE_DB";
const DEBUG_ENV: &str = "LINEPACE_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub cycles_per_operator: u32,
    /// Chance of a pause after each cycle, 0.0..=1.0.
    pub pause_probability: f64,
    pub pause_secs_min: f64,
    pub pause_secs_max: f64,
    /// Fixed seed for reproducible runs; random when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            cycles_per_operator: 12,
            pause_probability: 0.1,
            pause_secs_min: 120.0,
            pause_secs_max: 600.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    pub idle_eviction_secs: u64,
    pub sweep_interval_secs: u64,
    pub debug: bool,
    pub simulation: SimulationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("linepace.sqlite3"),
            idle_eviction_secs: 4 * 60 * 60,
            sweep_interval_secs: 5 * 60,
            debug: false,
            simulation: SimulationSettings::default(),
        }
    }
}

impl Settings {
    /// Reads the JSON settings file (`LINEPACE_CONFIG`, else
    /// `linepace.json`) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("linepace.json"));
        let mut settings = Self::from_file(&path)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Missing files yield defaults. A malformed file is reported and
    /// ignored rather than aborting startup.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Ok(Self::from_json(&contents).unwrap_or_else(|err| {
            warn!("Ignoring malformed settings in {}: {err}", path.display());
            Self::default()
        }))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("invalid settings JSON")
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var(DB_ENV) {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(value) = std::env::var(DEBUG_ENV) {
            self.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
