//! Runtime configuration loaded from `SNAPDECK_*` environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Result;
use snapdeck_core::{SchedulerParams, DEFAULT_MAXIMUM_INTERVAL, DEFAULT_RETENTION};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_CARDS: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Database file; `None` means the platform data directory.
    pub db_path: Option<PathBuf>,
    /// Target recall probability at the due date (SNAPDECK_RETENTION).
    pub request_retention: f64,
    /// Longest interval in days (SNAPDECK_MAX_INTERVAL).
    pub maximum_interval: u32,
    pub enable_fuzz: bool,
    /// Queue size when a start request omits `maxCards`.
    pub default_max_cards: u32,
    /// Allowed CORS origins, comma-separated in SNAPDECK_CORS_ORIGINS.
    /// `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            db_path: None,
            request_retention: DEFAULT_RETENTION,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
            enable_fuzz: true,
            default_max_cards: DEFAULT_MAX_CARDS,
            cors_origins: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unparsable values fall back to
    /// the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let host = parsed("SNAPDECK_HOST")
            .and_then(|v| v.parse::<IpAddr>().ok())
            .unwrap_or(defaults.host);
        let port = parsed("SNAPDECK_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let db_path = parsed("SNAPDECK_DB_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let request_retention = parsed("SNAPDECK_RETENTION")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|r| *r > 0.0 && *r < 1.0)
            .unwrap_or(defaults.request_retention);
        let maximum_interval = parsed("SNAPDECK_MAX_INTERVAL")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(defaults.maximum_interval);
        let enable_fuzz = parsed("SNAPDECK_FUZZ")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
            .unwrap_or(defaults.enable_fuzz);
        let default_max_cards = parsed("SNAPDECK_DEFAULT_MAX_CARDS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.default_max_cards);
        let cors_origins = parsed("SNAPDECK_CORS_ORIGINS")
            .filter(|v| !v.is_empty())
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect());

        Self {
            host,
            port,
            db_path,
            request_retention,
            maximum_interval,
            enable_fuzz,
            default_max_cards,
            cors_origins,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn scheduler_params(&self) -> SchedulerParams {
        SchedulerParams::default()
            .with_retention(self.request_retention)
            .with_maximum_interval(self.maximum_interval)
            .with_fuzz(self.enable_fuzz)
    }

    /// The configured database path, or `<data dir>/snapdeck.db`.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "snapdeck")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("snapdeck.db"))
    }
}
