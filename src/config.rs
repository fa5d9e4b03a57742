//! Scheduler configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::identity::queue_path;

/// Environment variable prefix read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "CLOUDTASK_SCHEDULER_";

/// Errors loading or validating a [`SchedulerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is missing or empty.
    #[error("missing configuration field: {0}")]
    MissingField(&'static str),

    /// A field is present but unusable.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The TOML document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the scheduler's tasks live and how they are marked.
///
/// # Example Configuration File
///
/// ```toml
/// project_id = "tokyo-rain-123"
/// location = "asia-northeast1"
/// queue = "scheduler"
/// prefix = "calendar-"
/// page_size = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Google Cloud project id.
    pub project_id: String,

    /// Queue location, e.g. `asia-northeast1`.
    pub location: String,

    /// Queue name.
    pub queue: String,

    /// Owner prefix. Every task id this scheduler creates starts with it.
    pub prefix: String,

    /// Tasks requested per list call. Clamped to `1..=1000` when used.
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

impl SchedulerConfig {
    /// Creates a configuration with the default page size.
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        queue: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            queue: queue.into(),
            prefix: prefix.into(),
            page_size: default_page_size(),
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Examples
    ///
    /// ```
    /// use cloudtask_scheduler::SchedulerConfig;
    ///
    /// let config = SchedulerConfig::from_toml(r#"
    ///     project_id = "p"
    ///     location = "l"
    ///     queue = "q"
    ///     prefix = "pre-"
    /// "#).unwrap();
    /// assert_eq!(config.queue_path(), "projects/p/locations/l/queues/q");
    /// assert_eq!(config.page_size, 1000);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            field: "config",
            reason: e.to_string(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// - `CLOUDTASK_SCHEDULER_PROJECT`
    /// - `CLOUDTASK_SCHEDULER_LOCATION`
    /// - `CLOUDTASK_SCHEDULER_QUEUE`
    /// - `CLOUDTASK_SCHEDULER_PREFIX`
    /// - `CLOUDTASK_SCHEDULER_PAGE_SIZE` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any variable source keyed like [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        let page_size = match var("PAGE_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "page_size",
                    reason: e.to_string(),
                })?,
            None => default_page_size(),
        };

        let config = Self {
            project_id: var("PROJECT").ok_or(ConfigError::MissingField("project_id"))?,
            location: var("LOCATION").ok_or(ConfigError::MissingField("location"))?,
            queue: var("QUEUE").ok_or(ConfigError::MissingField("queue"))?,
            prefix: var("PREFIX").ok_or(ConfigError::MissingField("prefix"))?,
            page_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every path component is present and the prefix is a valid task id fragment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("project_id", &self.project_id),
            ("location", &self.location),
            ("queue", &self.queue),
            ("prefix", &self.prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field));
            }
        }

        for (field, value) in [
            ("project_id", &self.project_id),
            ("location", &self.location),
            ("queue", &self.queue),
        ] {
            if value.contains('/') {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{value:?} must not contain '/'"),
                });
            }
        }

        if let Some(c) = self
            .prefix
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ConfigError::InvalidValue {
                field: "prefix",
                reason: format!("character {c:?} is not allowed in task ids"),
            });
        }

        Ok(())
    }

    /// `projects/<project>/locations/<location>/queues/<queue>`.
    pub fn queue_path(&self) -> String {
        queue_path(&self.project_id, &self.location, &self.queue)
    }

    /// The page size actually requested, clamped to what the queue accepts.
    pub fn effective_page_size(&self) -> i32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}
