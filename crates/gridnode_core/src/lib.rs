//! Logging setup for processes embedding the gridnode engine.
//!
//! The engine only emits `tracing` events; installing a subscriber is left
//! to the host. [`TracingConfig`] builds the subscriber a node agent
//! normally wants, configurable in code or from the environment:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `GRIDNODE_LOG` | `EnvFilter` directives, e.g. `gridnode_engine=debug` | `info` |
//! | `GRIDNODE_LOG_FORMAT` | `pretty`, `compact` or `json` | `pretty` |
//!
//! # Example
//!
//! ```
//! use gridnode_core::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! let config = TracingConfig::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .with_env_filter("gridnode_engine=debug,gridnode_store=info");
//!
//! assert_eq!(config.level(), Level::DEBUG);
//! ```

use core::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directives variable.
pub const LOG_ENV: &str = "GRIDNODE_LOG";

/// Output format variable.
pub const LOG_FORMAT_ENV: &str = "GRIDNODE_LOG_FORMAT";

/// Errors raised while configuring tracing.
#[derive(Debug, Error)]
pub enum TracingError {
    /// Unknown output format name.
    #[error("unknown log format '{0}', expected pretty, compact or json")]
    UnknownFormat(String),

    /// Filter directives did not parse.
    #[error("invalid log filter '{directives}': {source}")]
    InvalidFilter {
        /// Directives as given.
        directives: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per event, for log shipping.
    Json,
}

impl FromStr for TracingFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(TracingError::UnknownFormat(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Creates a config with `info` level and pretty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads [`LOG_ENV`] and [`LOG_FORMAT_ENV`]; unset variables keep the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TracingError::UnknownFormat`] for an unknown format name.
    pub fn from_env() -> Result<Self, TracingError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, TracingError> {
        let mut config = Self::default();
        if let Some(directives) = var(LOG_ENV).filter(|d| !d.trim().is_empty()) {
            config.env_filter = Some(directives);
        }
        if let Some(format) = var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Sets the level used when no filter directives are given.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets `EnvFilter` directives, overriding the level.
    #[must_use]
    pub fn with_env_filter(mut self, directives: impl Into<String>) -> Self {
        self.env_filter = Some(directives.into());
        self
    }

    /// Logs span enter and exit, which shows each dispatch step.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Configured format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match &self.env_filter {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|source| TracingError::InvalidFilter {
                    directives: directives.clone(),
                    source,
                })
            }
            None => Ok(EnvFilter::new(self.level.as_str())),
        }
    }

    /// Installs the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter directives are invalid or a subscriber
    /// is already installed.
    pub fn init(&self) -> Result<(), TracingError> {
        let filter = self.filter()?;
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(filter);
        match self.format {
            TracingFormat::Pretty => registry
                .with(tracing_subscriber::fmt::layer().pretty().with_span_events(span_events))
                .try_init()?,
            TracingFormat::Compact => registry
                .with(tracing_subscriber::fmt::layer().compact().with_span_events(span_events))
                .try_init()?,
            TracingFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_span_events(span_events))
                .try_init()?,
        }

        tracing::info!(level = %self.level, format = ?self.format, "tracing initialized");
        Ok(())
    }
}
