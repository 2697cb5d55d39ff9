use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "COVER_ENV";
const CONFIG_DIR_ENV: &str = "COVER_CONFIG_DIR";
const ENV_PREFIX: &str = "COVER";
const ENV_SEPARATOR: &str = "__";

const DEFAULT_CORE_PORT: u16 = 3000;
const DEFAULT_INDEX_PORT: u16 = 3002;

/// Variables understood by deployments predating the `COVER__` scheme,
/// paired with the settings key they feed.
const LEGACY_ENV_VARS: &[(&str, &str)] = &[
    ("server.host", "BB_COVER_HOST"),
    ("server.port", "BB_COVER_PORT"),
    ("upstreams.core.host", "BB_BABEL_HOST"),
    ("upstreams.core.port", "BB_BABEL_PORT"),
    ("upstreams.index.host", "BB_ENGINE_HOST"),
    ("upstreams.index.port", "BB_ENGINE_PORT"),
];

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub upstreams: UpstreamsSettings,
    #[serde(default)]
    pub aggregation: AggregationSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// legacy variables and `COVER__*` variables (highest precedence).
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to repo root `config` directory.
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_filename = format!("{}.toml", environment);
        let environment_path = config_dir.join(environment_filename);

        let mut builder = config::Config::builder()
            .set_default("upstreams.core.port", i64::from(DEFAULT_CORE_PORT))?
            .set_default("upstreams.index.port", i64::from(DEFAULT_INDEX_PORT))?
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );

        for &(key, legacy_var) in LEGACY_ENV_VARS {
            // A `COVER__` variable for the same key takes precedence.
            if std::env::var_os(modern_env_var(key)).is_some() {
                continue;
            }
            builder = builder
                .set_override_option(key, std::env::var(legacy_var).ok())
                .with_context(|| format!("failed to apply legacy variable {legacy_var}"))?;
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

/// `upstreams.core.port` -> `COVER__UPSTREAMS__CORE__PORT`
fn modern_env_var(key: &str) -> String {
    format!(
        "{ENV_PREFIX}{ENV_SEPARATOR}{}",
        key.to_uppercase().replace('.', ENV_SEPARATOR)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    /// Overall deadline for one inbound request, upstream fan-out included.
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3001
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Location of one backend service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamSettings {
    #[serde(default = "UpstreamSettings::default_scheme")]
    pub scheme: String,
    #[serde(default = "UpstreamSettings::default_host")]
    pub host: String,
    pub port: u16,
    /// Deadline for a single call to this backend.
    #[serde(default = "UpstreamSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl UpstreamSettings {
    fn default_scheme() -> String {
        "http".to_string()
    }

    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_timeout_ms() -> u64 {
        5000
    }

    /// Development defaults for a backend listening on `port`.
    pub fn local(port: u16) -> Self {
        Self {
            scheme: Self::default_scheme(),
            host: Self::default_host(),
            port,
            timeout_ms: Self::default_timeout_ms(),
        }
    }

    /// Base URL without a trailing slash, e.g. `http://localhost:3000`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamsSettings {
    /// System of record: users, auth, ownership, borrows, appointments.
    #[serde(default = "UpstreamsSettings::default_core")]
    pub core: UpstreamSettings,
    /// Book catalogue lookups by ISBN.
    #[serde(default = "UpstreamsSettings::default_index")]
    pub index: UpstreamSettings,
}

impl UpstreamsSettings {
    fn default_core() -> UpstreamSettings {
        UpstreamSettings::local(DEFAULT_CORE_PORT)
    }

    fn default_index() -> UpstreamSettings {
        UpstreamSettings::local(DEFAULT_INDEX_PORT)
    }
}

impl Default for UpstreamsSettings {
    fn default() -> Self {
        Self {
            core: Self::default_core(),
            index: Self::default_index(),
        }
    }
}

/// What a joined book list does when one catalogue lookup fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetailPolicy {
    /// The first failed lookup fails the whole list.
    #[default]
    FailFast,
    /// Failed lookups leave the entry without detail and mark it.
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AggregationSettings {
    #[serde(default)]
    pub detail_policy: DetailPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Env-filter directive; `RUST_LOG` wins when set.
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
