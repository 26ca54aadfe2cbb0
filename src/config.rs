//! Configuration loading: CLI argument parsing with `clap`, YAML deserialization
//! with `serde_yaml`, and the validation the original `BasicDataBridge.__init__`
//! performed before building any pools or queues.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// `bridge <config.yaml>` — the sole positional CLI argument.
#[derive(clap::Parser, Debug)]
#[command(name = "bridge", about = "Procurement data bridge")]
pub struct Cli {
    /// Path to the YAML configuration file.
    pub config: PathBuf,
}

fn default_resources_api_version() -> String {
    "2.4".to_string()
}

fn default_user_agent() -> String {
    "procurement-bridge".to_string()
}

fn default_workers_min() -> usize {
    1
}

fn default_workers_max() -> usize {
    10
}

fn default_retry_workers_min() -> usize {
    1
}

fn default_retry_workers_max() -> usize {
    2
}

fn default_filter_workers_count() -> usize {
    1
}

fn default_queue_size() -> i64 {
    1000
}

fn default_inc_threshold() -> f64 {
    75.0
}

fn default_dec_threshold() -> f64 {
    25.0
}

fn default_queues_controller_timeout() -> u64 {
    60
}

fn default_watch_interval() -> u64 {
    60
}

fn default_performance_window() -> u64 {
    3600
}

fn default_up_wait_sleep() -> u64 {
    30
}

/// `retrievers_params` block: parameters forwarded to the feeder.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieversParams {
    #[serde(default = "default_up_wait_sleep")]
    pub up_wait_sleep: u64,
}

impl Default for RetrieversParams {
    fn default() -> Self {
        Self {
            up_wait_sleep: default_up_wait_sleep(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub worker_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub filter_type: Option<String>,
}

/// One bounded-or-unbounded queue size as written in YAML: `-1` means unbounded.
#[derive(Debug, Clone, Copy)]
pub struct QueueSize(pub Option<usize>);

impl<'de> Deserialize<'de> for QueueSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Ok(if raw < 0 {
            QueueSize(None)
        } else {
            QueueSize(Some(raw as usize))
        })
    }
}

impl Default for QueueSize {
    fn default() -> Self {
        QueueSize(Some(default_queue_size() as usize))
    }
}

/// The `main:` block of the bridge configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    pub resources_api_server: String,

    #[serde(default = "default_resources_api_version")]
    pub resources_api_version: String,

    pub resource: String,

    #[serde(default)]
    pub extra_params: HashMap<String, String>,

    #[serde(default)]
    pub retrievers_params: RetrieversParams,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_workers_min")]
    pub workers_min: usize,
    #[serde(default = "default_workers_max")]
    pub workers_max: usize,

    #[serde(default = "default_retry_workers_min")]
    pub retry_workers_min: usize,
    #[serde(default = "default_retry_workers_max")]
    pub retry_workers_max: usize,

    #[serde(default = "default_filter_workers_count")]
    pub filter_workers_count: usize,

    #[serde(default)]
    pub input_queue_size: QueueSize,
    #[serde(default)]
    pub resource_items_queue_size: QueueSize,
    #[serde(default)]
    pub retry_resource_items_queue_size: QueueSize,

    #[serde(default = "default_inc_threshold")]
    pub workers_inc_threshold: f64,
    #[serde(default = "default_dec_threshold")]
    pub workers_dec_threshold: f64,

    #[serde(default = "default_queues_controller_timeout")]
    pub queues_controller_timeout: u64,
    #[serde(default = "default_watch_interval")]
    pub watch_interval: u64,
    #[serde(rename = "perfomance_window", default = "default_performance_window")]
    pub performance_window: u64,

    #[serde(default)]
    pub storage_config: StorageConfig,
    #[serde(default)]
    pub worker_config: WorkerConfig,
    #[serde(default)]
    pub filter_config: FilterConfig,

    #[serde(default)]
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub main: MainConfig,
}

impl Config {
    /// Load and validate a bridge configuration from a YAML file.
    ///
    /// Mirrors `BasicDataBridge.__init__`'s validation order: empty/missing
    /// `resources_api_server` first, then URL parseability, then
    /// `up_wait_sleep`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.main.resources_api_server.trim().is_empty() {
            return Err(ConfigError::MissingApiServer);
        }
        let url = url::Url::parse(&self.main.resources_api_server)?;
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidApiServerUrl(
                url::ParseError::EmptyHost,
            ));
        }
        if self.main.retrievers_params.up_wait_sleep < 30 {
            return Err(ConfigError::UpWaitSleepTooLow);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(body: &str) -> tempfile_path::TempYaml {
        tempfile_path::TempYaml::new(body)
    }

    // Minimal self-contained temp-file helper so this test module does not
    // need an extra dev-dependency just to exercise `Config::load`.
    mod tempfile_path {
        use std::io::Write;
        use std::path::PathBuf;

        pub struct TempYaml {
            pub path: PathBuf,
        }

        impl TempYaml {
            pub fn new(body: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("bridge-config-test-{}.yaml", rand::random::<u64>()));
                let mut f = std::fs::File::create(&path).unwrap();
                f.write_all(body.as_bytes()).unwrap();
                Self { path }
            }
        }

        impl Drop for TempYaml {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn rejects_missing_api_server() {
        let body = "main:\n  resources_api_server: \"\"\n  resource: tenders\n";
        let tmp = write_config(body);
        let err = Config::load(&tmp.path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiServer));
    }

    #[test]
    fn rejects_low_up_wait_sleep() {
        let body = "main:\n  resources_api_server: http://example.com\n  resource: tenders\n  retrievers_params:\n    up_wait_sleep: 29\n";
        let tmp = write_config(body);
        let err = Config::load(&tmp.path).unwrap_err();
        assert!(matches!(err, ConfigError::UpWaitSleepTooLow));
    }

    #[test]
    fn accepts_minimal_valid_config() {
        let body = "main:\n  resources_api_server: http://example.com\n  resource: tenders\n";
        let tmp = write_config(body);
        let config = Config::load(&tmp.path).unwrap();
        assert_eq!(config.main.resource, "tenders");
        assert_eq!(config.main.workers_min, 1);
        assert!(config.main.input_queue_size.0.is_some());
    }

    #[test]
    fn unbounded_queue_size_parses_to_none() {
        let body = "main:\n  resources_api_server: http://example.com\n  resource: tenders\n  input_queue_size: -1\n";
        let tmp = write_config(body);
        let config = Config::load(&tmp.path).unwrap();
        assert!(config.main.input_queue_size.0.is_none());
    }

    #[test_case::test_case(-1, None; "negative one means unbounded")]
    #[test_case::test_case(-100, None; "any negative value means unbounded")]
    #[test_case::test_case(0, Some(0); "zero is a bounded queue of size zero")]
    #[test_case::test_case(500, Some(500); "a positive value is that bound")]
    fn queue_size_deserializes(raw: i64, expected: Option<usize>) {
        let size: QueueSize = serde_yaml::from_str(&raw.to_string()).unwrap();
        assert_eq!(size.0, expected);
    }
}
