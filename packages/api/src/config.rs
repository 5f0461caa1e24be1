//! Server configuration read from `JOBRELAY_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use db::DbConfig;
use relay_core::PipelineConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Where jobs are stored.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Plain in-process map.
    Memory,
    /// SurrealDB at the configured endpoint.
    Surreal(DbConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Executable invoked once per job attempt.
    pub runner: PathBuf,
    pub storage: StorageBackend,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            runner: PathBuf::from("./job.sh"),
            storage: StorageBackend::Memory,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Read the process environment.
    ///
    /// | variable                      | default       |
    /// |-------------------------------|---------------|
    /// | `JOBRELAY_HOST`               | `127.0.0.1`   |
    /// | `JOBRELAY_PORT`               | `8000`        |
    /// | `JOBRELAY_RUNNER`             | `./job.sh`    |
    /// | `JOBRELAY_STORAGE`            | `memory`, or a SurrealDB endpoint such as `mem://` |
    /// | `JOBRELAY_CONCURRENCY`        | `10`          |
    /// | `JOBRELAY_MAX_RETRIES`        | `2`           |
    /// | `JOBRELAY_RETRY_BACKOFF_MS`   | `3000`        |
    /// | `JOBRELAY_POLL_DELAY_MS`      | `100`         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("JOBRELAY_HOST") {
            config.host = host;
        }
        if let Some(port) = parse(&lookup, "JOBRELAY_PORT")? {
            config.port = port;
        }
        if let Some(runner) = lookup("JOBRELAY_RUNNER") {
            config.runner = PathBuf::from(runner);
        }
        if let Some(storage) = lookup("JOBRELAY_STORAGE") {
            config.storage = match storage.as_str() {
                "memory" => StorageBackend::Memory,
                endpoint if endpoint.contains("://") => {
                    StorageBackend::Surreal(DbConfig::endpoint(endpoint))
                }
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "JOBRELAY_STORAGE",
                        value: storage,
                    });
                }
            };
        }

        let pipeline = &mut config.pipeline;
        if let Some(concurrency) = parse(&lookup, "JOBRELAY_CONCURRENCY")? {
            pipeline.concurrency = concurrency;
        }
        if let Some(max_retries) = parse(&lookup, "JOBRELAY_MAX_RETRIES")? {
            pipeline.max_retries = max_retries;
        }
        if let Some(backoff) = parse(&lookup, "JOBRELAY_RETRY_BACKOFF_MS")? {
            pipeline.retry_backoff_ms = backoff;
        }
        if let Some(poll) = parse(&lookup, "JOBRELAY_POLL_DELAY_MS")? {
            pipeline.poll_delay_ms = poll;
        }

        if config.pipeline.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "JOBRELAY_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}
