//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so a missing file
//! yields a runnable server.

pub mod heartbeat;
pub mod logging;
pub mod server;

use serde::{Deserialize, Serialize};

pub use self::heartbeat::HeartbeatConfig;
pub use self::logging::LoggingConfig;
pub use self::server::ServerConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides (`PULSE__SERVER__PORT=9000`).
const ENV_PREFIX: &str = "PULSE";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Heartbeat and read loop settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml` with an environment-specific overlay
    /// `config/{env}.toml` and environment variables prefixed with `PULSE__`.
    /// Both files are optional.
    pub fn load(env: &str) -> Result<Self, AppError> {
        tracing::debug!("Loading configuration (env: {})", env);

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, AppError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml));

        Self::build(builder)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.server.host.trim().is_empty() {
            return Err(AppError::configuration("server.host must not be empty"));
        }
        if self.server.backlog == 0 {
            return Err(AppError::configuration("server.backlog must be greater than 0"));
        }
        if self.heartbeat.interval_ms == 0 {
            return Err(AppError::configuration(
                "heartbeat.interval_ms must be greater than 0",
            ));
        }
        if self.heartbeat.read_chunk_size == 0 {
            return Err(AppError::configuration(
                "heartbeat.read_chunk_size must be greater than 0",
            ));
        }
        Ok(())
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config: Self = builder.build()?.try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}
