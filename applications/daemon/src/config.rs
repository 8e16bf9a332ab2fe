/// Daemon configuration
use crate::error::{DaemonError, Result};
use gramophone_playback::PlaybackConfig;
use gramophone_server_client::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix; nested keys use `__`, e.g. `GRAMOPHONE_DATABASE__URL`
pub const ENV_PREFIX: &str = "GRAMOPHONE";

/// Config file read when no path is given and it exists
pub const DEFAULT_CONFIG_FILE: &str = "gramophone.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Remote media server; playback is not reported when absent
    #[serde(default)]
    pub server: Option<RemoteSettings>,

    #[serde(default)]
    pub engine: EngineKind,

    #[serde(default)]
    pub output: OutputKind,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteSettings {
    pub url: String,

    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_device_name")]
    pub device_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Default `tracing` filter directive, used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

/// Which playback engine drives the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Every source is a local file
    #[default]
    Local,
    /// HTTP sources are sniffed for their container type
    Streaming,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Local => "local",
            EngineKind::Streaming => "streaming",
        }
    }
}

/// Where decoded audio goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Decode and play through the default output device
    #[default]
    Audio,
    /// Keep time without decoding; sources must carry a duration
    Headless,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Audio => "audio",
            OutputKind::Headless => "headless",
        }
    }
}

/// Values given on the command line; they win over file and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub engine: Option<EngineKind>,
    pub output: Option<OutputKind>,
}

impl DaemonConfig {
    /// Load configuration from file, environment and command line
    ///
    /// An explicit `path` must exist; otherwise `gramophone.toml` in the
    /// working directory is read if present.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        settings = settings
            .set_override_option("database.url", overrides.database_url.clone())?
            .set_override_option("engine", overrides.engine.map(EngineKind::as_str))?
            .set_override_option("output", overrides.output.map(OutputKind::as_str))?;

        Ok(settings.build()?.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(DaemonError::Config(
                "Database URL is required (set GRAMOPHONE_DATABASE__URL)".to_string(),
            ));
        }

        let progress = &self.playback.progress;
        if !(progress.played_threshold > 0.0 && progress.played_threshold <= 1.0) {
            return Err(DaemonError::Config(format!(
                "playback.progress.played_threshold must be in (0, 1], got {}",
                progress.played_threshold
            )));
        }
        if progress.interval_secs == 0 {
            return Err(DaemonError::Config(
                "playback.progress.interval_secs must be at least 1".to_string(),
            ));
        }

        if let Some(server) = &self.server {
            if !server.url.starts_with("http://") && !server.url.starts_with("https://") {
                return Err(DaemonError::Config(format!(
                    "server.url must start with http:// or https://, got {:?}",
                    server.url
                )));
            }
        }

        Ok(())
    }
}

impl RemoteSettings {
    pub fn client_config(&self) -> ServerConfig {
        ServerConfig {
            url: self.url.clone(),
            access_token: self.access_token.clone(),
            user_id: self.user_id.clone(),
            device_name: self.device_name.clone(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

// Default values
fn default_database_url() -> String {
    "sqlite://./data/gramophone.db".to_string()
}

fn default_device_name() -> String {
    "gramophoned".to_string()
}

fn default_filter() -> String {
    "gramophone_daemon=info,gramophone_playback=info,gramophone_storage=warn".to_string()
}
