//! Configuration management for the tipwatch binary

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tipwatch_scanner::{FailurePolicy, NodeConfig, PollConfig, PollMode};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Ergo node connection
    pub node: NodeConfig,
    /// Polling behaviour
    pub poll: PollSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Milliseconds between ticks
    pub interval_ms: u64,
    pub mode: ModeSetting,
    /// Upper bound on blocks fetched per tick in catch-up mode
    pub max_catch_up_blocks: u64,
    pub failure_policy: PolicySetting,
    /// Consecutive failed ticks tolerated before giving up (tolerant policy only)
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSetting {
    Tip,
    CatchUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySetting {
    Fatal,
    Tolerant,
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    builder
        .set_default("node.url", NodeConfig::default().url)?
        .set_default("poll.interval_ms", 1000)?
        .set_default("poll.mode", "tip")?
        .set_default("poll.max_catch_up_blocks", 16)?
        .set_default("poll.failure_policy", "fatal")?
        .set_default("poll.max_consecutive_failures", 5)
}

impl WatcherConfig {
    /// Load configuration from default locations.
    ///
    /// Precedence, lowest first: defaults, the file named by `TIPWATCH_CONFIG`
    /// (or `config/tipwatch.*` when unset), `TIPWATCH_*` environment
    /// variables, then `node_url` from the command line.
    pub fn load(node_url: Option<&str>) -> Result<Self, config::ConfigError> {
        match std::env::var("TIPWATCH_CONFIG") {
            Ok(path) => Self::load_from(Some(Path::new(&path)), None, node_url),
            Err(_) => Self::load_from(None, None, node_url),
        }
    }

    /// `env_vars` replaces the process environment when given
    fn load_from(
        file: Option<&Path>,
        env_vars: Option<config::Map<String, String>>,
        node_url: Option<&str>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = with_defaults(config::Config::builder())?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("config/tipwatch").required(false)),
        };

        // e.g. TIPWATCH_POLL__INTERVAL_MS=500
        builder = builder.add_source(
            config::Environment::with_prefix("TIPWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env_vars),
        );

        if let Some(url) = node_url {
            builder = builder.set_override("node.url", url)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn poll_mode(&self) -> PollMode {
        match self.poll.mode {
            ModeSetting::Tip => PollMode::Tip,
            ModeSetting::CatchUp => PollMode::CatchUp {
                max_blocks: self.poll.max_catch_up_blocks,
            },
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        match self.poll.failure_policy {
            PolicySetting::Fatal => FailurePolicy::Fatal,
            PolicySetting::Tolerant => FailurePolicy::Tolerant {
                max_consecutive_failures: self.poll.max_consecutive_failures,
            },
        }
    }

    /// Validated loop configuration
    pub fn poll_config(&self) -> Result<PollConfig, config::ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "poll.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll.mode == ModeSetting::CatchUp && self.poll.max_catch_up_blocks == 0 {
            return Err(config::ConfigError::Message(
                "poll.max_catch_up_blocks must be greater than zero".to_string(),
            ));
        }

        Ok(PollConfig {
            interval: Duration::from_millis(self.poll.interval_ms),
            failure_policy: self.failure_policy(),
        })
    }
}
