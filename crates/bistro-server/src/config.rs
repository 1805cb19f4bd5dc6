//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory
    pub data_dir: PathBuf,
    /// Database path
    pub database_path: PathBuf,
    /// Tick interval for the floor feed (alerts + occupancy)
    pub floor_interval: Duration,
    /// Tick interval for the heat-map feed
    pub heat_map_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = home.join(".bistro");
        Self {
            database_path: data_dir.join("bistro.db"),
            data_dir,
            floor_interval: Duration::from_secs(10),
            heat_map_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from the environment or defaults.
    ///
    /// `BISTRO_DIR` overrides the data directory (`~/.bistro`), which
    /// is created if missing.
    pub fn load() -> anyhow::Result<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = std::env::var("BISTRO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".bistro"));

        std::fs::create_dir_all(&data_dir)?;

        Ok(Self {
            database_path: data_dir.join("bistro.db"),
            data_dir,
            floor_interval: Duration::from_secs(10),
            heat_map_interval: Duration::from_secs(30),
        })
    }
}
