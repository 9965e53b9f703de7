// config.rs: Daemon configuration from cs-daemon.toml.
//
// Every section and field has a default, so a missing file or an empty one
// yields a working config: a JSON store under `.cs/`, a Monday 03:00
// America/New_York schedule and an unbounded fan-out.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use cs_reconcile::EngineOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON document store snapshot.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Weekly calendar rule, e.g. "every monday 03:00" in a named time zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Day of week: "mon", "monday", "Tue", ...
    #[serde(default = "default_weekday")]
    pub weekday: String,

    #[serde(default = "default_hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,

    /// IANA time zone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekday: default_weekday(),
            hour: default_hour(),
            minute: 0,
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// Maximum in-flight community tasks; 0 means unbounded.
    #[serde(default)]
    pub max_concurrency: usize,

    /// Lease holder prefix; a per-run UUID is appended.
    #[serde(default = "default_holder")]
    pub holder: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl_secs(),
            max_concurrency: 0,
            holder: default_holder(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON log lines instead of plain text.
    #[serde(default)]
    pub json: bool,
}

/// Longer leases are clamped; a week covers any realistic run.
const MAX_LEASE_TTL_SECS: i64 = 7 * 24 * 3600;

fn default_store_path() -> PathBuf {
    PathBuf::from(".cs/store.json")
}

fn default_weekday() -> String {
    "mon".to_string()
}

fn default_hour() -> u32 {
    3
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_lease_ttl_secs() -> u64 {
    3600
}

fn default_holder() -> String {
    "cs-daemon".to_string()
}

impl DaemonConfig {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Load the config, falling back to defaults when the file doesn't exist.
    /// A file that exists but doesn't parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Schedule fields are checked by building the schedule.
        crate::schedule::WeeklySchedule::from_config(&self.schedule)?;
        if self.reconcile.lease_ttl_secs == 0 {
            bail!("reconcile.lease_ttl_secs must be positive");
        }
        if self.reconcile.holder.trim().is_empty() {
            bail!("reconcile.holder must not be empty");
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            lease_ttl: Duration::seconds(
                i64::try_from(self.reconcile.lease_ttl_secs)
                    .unwrap_or(i64::MAX)
                    .min(MAX_LEASE_TTL_SECS),
            ),
            holder: self.reconcile.holder.clone(),
            max_concurrency: match self.reconcile.max_concurrency {
                0 => None,
                n => Some(n),
            },
            ..EngineOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() {
        let config = DaemonConfig::parse("").unwrap();
        assert_eq!(config.store.path, PathBuf::from(".cs/store.json"));
        assert_eq!(config.schedule.weekday, "mon");
        assert_eq!(config.schedule.hour, 3);
        assert_eq!(config.schedule.timezone, "America/New_York");
        assert_eq!(config.reconcile.lease_ttl_secs, 3600);
        assert!(!config.log.json);
    }

    #[test]
    fn parses_full_config() {
        let config = DaemonConfig::parse(
            r#"
            [store]
            path = "/var/lib/cs/store.json"

            [schedule]
            weekday = "friday"
            hour = 22
            minute = 30
            timezone = "Europe/Berlin"

            [reconcile]
            lease_ttl_secs = 600
            max_concurrency = 8
            holder = "worker-1"

            [log]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.schedule.minute, 30);
        assert!(config.log.json);
        let options = config.engine_options();
        assert_eq!(options.lease_ttl, Duration::seconds(600));
        assert_eq!(options.max_concurrency, Some(8));
        assert_eq!(options.holder, "worker-1");
    }

    #[test]
    fn zero_concurrency_means_unbounded() {
        let options = DaemonConfig::default().engine_options();
        assert_eq!(options.max_concurrency, None);
    }

    #[test]
    fn rejects_bad_schedule() {
        assert!(DaemonConfig::parse("[schedule]\nhour = 24").is_err());
        assert!(DaemonConfig::parse("[schedule]\nminute = 60").is_err());
        assert!(DaemonConfig::parse("[schedule]\nweekday = \"someday\"").is_err());
        assert!(DaemonConfig::parse("[schedule]\ntimezone = \"Mars/Olympus\"").is_err());
    }

    #[test]
    fn rejects_zero_ttl() {
        let err = DaemonConfig::parse("[reconcile]\nlease_ttl_secs = 0").unwrap_err();
        assert!(err.to_string().contains("lease_ttl_secs"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = DaemonConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.schedule.hour, 3);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cs-daemon.toml");
        std::fs::write(&path, "[schedule\n").unwrap();
        assert!(DaemonConfig::load_or_default(&path).is_err());
    }
}
