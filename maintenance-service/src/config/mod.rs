use crate::engine::FailurePolicy;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub notification: NotificationConfig,
    pub generation: GenerationSettings,
    pub interest_job: InterestJobConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Base URL of the notification service. Notifications are only logged
    /// when unset.
    pub service_url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub failure_policy: FailurePolicy,
    /// Upper bound on concurrent inserts while persisting a batch.
    pub persist_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct InterestJobConfig {
    pub societies: Vec<String>,
    pub interval: Duration,
}

impl InterestJobConfig {
    pub fn is_enabled(&self) -> bool {
        !self.societies.is_empty() && !self.interval.is_zero()
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                mongodb_uri: None,
                mongodb_database: "maintenance_db".to_string(),
            },
            notification: NotificationConfig {
                service_url: None,
                timeout: Duration::from_millis(2000),
            },
            generation: GenerationSettings {
                failure_policy: FailurePolicy::AbortAll,
                persist_concurrency: 8,
            },
            interest_job: InterestJobConfig {
                societies: Vec::new(),
                interval: Duration::from_secs(3600),
            },
        }
    }
}

impl MaintenanceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production();

        let backend: StoreBackend = get_env("STORE_BACKEND", Some("mongo"), is_prod)?
            .parse()
            .map_err(config_error)?;
        let mongodb_uri = match backend {
            StoreBackend::Mongo => Some(get_env("MONGODB_URI", None, is_prod)?),
            StoreBackend::Memory => None,
        };

        Ok(MaintenanceConfig {
            common,
            store: StoreConfig {
                backend,
                mongodb_uri,
                mongodb_database: get_env("MONGODB_DATABASE", Some("maintenance_db"), is_prod)?,
            },
            notification: NotificationConfig {
                service_url: env::var("NOTIFICATION_SERVICE_URL").ok().filter(|s| !s.is_empty()),
                timeout: Duration::from_millis(parse_env("NOTIFICATION_TIMEOUT_MS", 2000)?),
            },
            generation: GenerationSettings {
                failure_policy: env::var("GENERATION_FAILURE_POLICY")
                    .unwrap_or_else(|_| "abort_all".to_string())
                    .parse()
                    .map_err(config_error)?,
                persist_concurrency: parse_env("PERSIST_CONCURRENCY", 8usize)?.max(1),
            },
            interest_job: InterestJobConfig {
                societies: env::var("INTEREST_JOB_SOCIETIES")
                    .map(|raw| split_list(&raw))
                    .unwrap_or_default(),
                interval: Duration::from_secs(parse_env("INTEREST_JOB_INTERVAL_SECS", 3600)?),
            },
        })
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

fn config_error(message: String) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| config_error(format!("{} is invalid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(config_error(format!("{} is required in production but not set", key)))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(config_error(format!("{} is required but not set", key)))
            }
        }
    }
}
