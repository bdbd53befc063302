//! Configuration file support for gitrail.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `GITRAIL_`, sections separated by
//!    a double underscore, e.g. `GITRAIL_DATABASE__URL`, `GITRAIL_POLLER__CADENCE_SECS`)
//! 3. Config file (./gitrail.toml, then ~/.config/gitrail/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/gitrail/gitrail.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "postgres://localhost/gitrail"
//!
//! [poller]
//! cadence_secs = 60
//! safety_window_secs = 50
//! max_branches_per_project = 3
//! fast = true
//!
//! [enrich]
//! batch_size = 20
//! max_reschedules = 10
//! min_rate_limit_wait_secs = 300
//! continue_delay_secs = 30
//! abandon_level = "warn"
//! chain_marker_ttl_secs = 1800
//!
//! [rate_limit]
//! threshold_percent = 90
//! cache_ttl_secs = 30
//! requests_per_second = 10
//!
//! [workers]
//! count = 4
//! job_timeout_secs = 600
//! max_retries = 3
//!
//! [broadcast]
//! recent_limit = 20
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use gitrail::broadcast::BroadcastConfig;
use gitrail::platform::QuotaConfig;
use gitrail::queue::{IngestMode, WorkerConfig};
use gitrail::retry::RetryConfig;
use gitrail::sync::{AbandonPolicy, EnrichConfig, IngestConfig, PollerConfig, SyncConfig};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub poller: PollerSection,
    pub enrich: EnrichSection,
    pub rate_limit: RateLimitSection,
    pub workers: WorkersSection,
    pub broadcast: BroadcastSection,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/gitrail/gitrail.db` if not specified.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    pub cadence_secs: u64,
    /// Minimum age of a project's watermark before it is polled again.
    pub safety_window_secs: u64,
    pub max_branches_per_project: u64,
    /// Ingest without per-commit fetches and backfill stats later.
    pub fast: bool,
}

impl Default for PollerSection {
    fn default() -> Self {
        let defaults = PollerConfig::default();
        Self {
            cadence_secs: defaults.cadence.as_secs(),
            safety_window_secs: defaults.safety_window.as_secs(),
            max_branches_per_project: defaults.max_branches_per_project,
            fast: defaults.ingest_mode == IngestMode::Fast,
        }
    }
}

/// Log level used when enrichment of a project is abandoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbandonLevel {
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EnrichSection {
    pub batch_size: u64,
    pub max_reschedules: u32,
    pub min_rate_limit_wait_secs: u64,
    pub continue_delay_secs: u64,
    pub abandon_level: AbandonLevel,
    pub chain_marker_ttl_secs: u64,
}

impl Default for EnrichSection {
    fn default() -> Self {
        let defaults = EnrichConfig::default();
        Self {
            batch_size: defaults.batch_size,
            max_reschedules: defaults.max_reschedules,
            min_rate_limit_wait_secs: defaults.min_rate_limit_wait.as_secs(),
            continue_delay_secs: defaults.continue_delay.as_secs(),
            abandon_level: AbandonLevel::Warn,
            chain_marker_ttl_secs: defaults.chain_marker_ttl.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Consumption percentage above which enrichment defers.
    pub threshold_percent: u8,
    pub cache_ttl_secs: u64,
    /// Client-side pacing of GitHub requests, shared by all workers.
    pub requests_per_second: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        let defaults = QuotaConfig::default();
        Self {
            threshold_percent: defaults.threshold_percent,
            cache_ttl_secs: defaults.cache_ttl.as_secs(),
            requests_per_second: defaults.requests_per_second,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkersSection {
    pub count: usize,
    pub job_timeout_secs: u64,
    /// Retries of a job failing with a transient error.
    pub max_retries: usize,
}

impl Default for WorkersSection {
    fn default() -> Self {
        let defaults = WorkerConfig::default();
        Self {
            count: defaults.workers,
            job_timeout_secs: defaults.job_timeout.as_secs(),
            max_retries: defaults.retry.max_retries,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BroadcastSection {
    /// Number of recent commits carried by `commits-list` messages.
    pub recent_limit: u64,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            recent_limit: BroadcastConfig::default().recent_limit,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/gitrail/config.toml)
    /// 3. Local config file (./gitrail.toml)
    /// 4. Environment variables with GITRAIL_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "gitrail") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("gitrail.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./gitrail.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // GITRAIL_POLLER__CADENCE_SECS -> poller.cadence_secs
        builder = builder.add_source(environment());

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter of the default enables read-write access and
    /// creates the file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("gitrail.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/gitrail` or `~/.local/state/gitrail`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gitrail").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }

    /// Pipeline settings for the library.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            ingest: IngestConfig {
                recent_limit: self.broadcast.recent_limit,
                ..IngestConfig::default()
            },
            poller: PollerConfig {
                cadence: Duration::from_secs(self.poller.cadence_secs),
                safety_window: Duration::from_secs(self.poller.safety_window_secs),
                max_branches_per_project: self.poller.max_branches_per_project,
                ingest_mode: if self.poller.fast {
                    IngestMode::Fast
                } else {
                    IngestMode::Full
                },
            },
            enrich: EnrichConfig {
                batch_size: self.enrich.batch_size.max(1),
                max_reschedules: self.enrich.max_reschedules,
                min_rate_limit_wait: Duration::from_secs(self.enrich.min_rate_limit_wait_secs),
                continue_delay: Duration::from_secs(self.enrich.continue_delay_secs),
                abandon_policy: match self.enrich.abandon_level {
                    AbandonLevel::Warn => AbandonPolicy::Warn,
                    AbandonLevel::Error => AbandonPolicy::Error,
                },
                chain_marker_ttl: Duration::from_secs(self.enrich.chain_marker_ttl_secs),
            },
            quota: self.quota_config(),
            broadcast: BroadcastConfig {
                recent_limit: self.broadcast.recent_limit,
            },
        }
    }

    pub fn quota_config(&self) -> QuotaConfig {
        QuotaConfig {
            threshold_percent: self.rate_limit.threshold_percent.min(100),
            cache_ttl: Duration::from_secs(self.rate_limit.cache_ttl_secs),
            requests_per_second: self.rate_limit.requests_per_second,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        let retry = RetryConfig {
            max_retries: self.workers.max_retries,
            ..RetryConfig::default()
        };
        WorkerConfig {
            workers: self.workers.count.max(1),
            job_timeout: Duration::from_secs(self.workers.job_timeout_secs),
            retry,
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("GITRAIL")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
