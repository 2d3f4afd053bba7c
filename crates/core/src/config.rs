use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub presenter: PresenterConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub patch_max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct PresenterConfig {
    /// Origin prepended to generated links; falls back to `backend.base_url`.
    pub origin: Option<String>,
    pub copy_confirmation_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub origin: Option<String>,
    pub timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://127.0.0.1:3000".to_string(),
                timeout_secs: 30,
                patch_max_retries: 2,
                retry_base_delay_ms: 250,
            },
            presenter: PresenterConfig { origin: None, copy_confirmation_secs: 2 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("collateral.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn origin(&self) -> &str {
        self.presenter.origin.as_deref().unwrap_or(&self.backend.base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.backend.patch_max_retries,
            base_delay: Duration::from_millis(self.backend.retry_base_delay_ms),
            backoff_multiplier: 2,
        }
    }

    pub fn copy_confirmation(&self) -> Duration {
        Duration::from_secs(self.presenter.copy_confirmation_secs)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(backend) = patch.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(timeout_secs) = backend.timeout_secs {
                self.backend.timeout_secs = timeout_secs;
            }
            if let Some(patch_max_retries) = backend.patch_max_retries {
                self.backend.patch_max_retries = patch_max_retries;
            }
            if let Some(retry_base_delay_ms) = backend.retry_base_delay_ms {
                self.backend.retry_base_delay_ms = retry_base_delay_ms;
            }
        }

        if let Some(presenter) = patch.presenter {
            if let Some(origin) = presenter.origin {
                self.presenter.origin = Some(origin);
            }
            if let Some(copy_confirmation_secs) = presenter.copy_confirmation_secs {
                self.presenter.copy_confirmation_secs = copy_confirmation_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COLLATERAL_BACKEND_BASE_URL") {
            self.backend.base_url = value;
        }
        if let Some(value) = read_env("COLLATERAL_BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_u64("COLLATERAL_BACKEND_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COLLATERAL_BACKEND_PATCH_MAX_RETRIES") {
            self.backend.patch_max_retries =
                parse_u32("COLLATERAL_BACKEND_PATCH_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("COLLATERAL_BACKEND_RETRY_BASE_DELAY_MS") {
            self.backend.retry_base_delay_ms =
                parse_u64("COLLATERAL_BACKEND_RETRY_BASE_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("COLLATERAL_PRESENTER_ORIGIN") {
            self.presenter.origin = Some(value);
        }
        if let Some(value) = read_env("COLLATERAL_PRESENTER_COPY_CONFIRMATION_SECS") {
            self.presenter.copy_confirmation_secs =
                parse_u64("COLLATERAL_PRESENTER_COPY_CONFIRMATION_SECS", &value)?;
        }

        let log_level =
            read_env("COLLATERAL_LOGGING_LEVEL").or_else(|| read_env("COLLATERAL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COLLATERAL_LOGGING_FORMAT").or_else(|| read_env("COLLATERAL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.backend.base_url = base_url;
        }
        if let Some(origin) = overrides.origin {
            self.presenter.origin = Some(origin);
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.backend.timeout_secs = timeout_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_backend(&self.backend)?;
        validate_presenter(&self.presenter)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("collateral.toml"), PathBuf::from("config/collateral.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    (value.starts_with("http://") || value.starts_with("https://"))
        && url::Url::parse(value).is_ok()
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ConfigError> {
    if !is_http_url(&backend.base_url) {
        return Err(ConfigError::Validation(
            "backend.base_url must be an absolute http:// or https:// URL".to_string(),
        ));
    }

    if backend.timeout_secs == 0 || backend.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "backend.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if backend.patch_max_retries > 10 {
        return Err(ConfigError::Validation(
            "backend.patch_max_retries must be at most 10".to_string(),
        ));
    }

    Ok(())
}

fn validate_presenter(presenter: &PresenterConfig) -> Result<(), ConfigError> {
    if let Some(origin) = &presenter.origin {
        if !is_http_url(origin) {
            return Err(ConfigError::Validation(
                "presenter.origin must start with http:// or https://".to_string(),
            ));
        }
    }

    if presenter.copy_confirmation_secs == 0 {
        return Err(ConfigError::Validation(
            "presenter.copy_confirmation_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    backend: Option<BackendPatch>,
    presenter: Option<PresenterPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    patch_max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PresenterPatch {
    origin: Option<String>,
    copy_confirmation_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
