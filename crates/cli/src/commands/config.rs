use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use collateral_core::config::AppConfig;
use toml::Value;

use crate::commands::{CommandResult, GlobalOptions};

pub fn run(options: &GlobalOptions) -> CommandResult {
    let config = match AppConfig::load(options.load_options()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let file_path = detect_config_path(options.config_path.as_deref());
    let sources = Sources { doc: load_config_file_doc(file_path.as_deref()), path: file_path };

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];

    let base_url_source = if options.base_url.is_some() {
        "flag (--base-url)".to_string()
    } else {
        sources.of("backend.base_url", &["COLLATERAL_BACKEND_BASE_URL"])
    };
    lines.push(render_line("backend.base_url", &config.backend.base_url, base_url_source));
    lines.push(render_line(
        "backend.timeout_secs",
        &config.backend.timeout_secs.to_string(),
        sources.of("backend.timeout_secs", &["COLLATERAL_BACKEND_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "backend.patch_max_retries",
        &config.backend.patch_max_retries.to_string(),
        sources.of("backend.patch_max_retries", &["COLLATERAL_BACKEND_PATCH_MAX_RETRIES"]),
    ));
    lines.push(render_line(
        "backend.retry_base_delay_ms",
        &config.backend.retry_base_delay_ms.to_string(),
        sources.of("backend.retry_base_delay_ms", &["COLLATERAL_BACKEND_RETRY_BASE_DELAY_MS"]),
    ));

    let origin_source = match config.presenter.origin {
        Some(_) => sources.of("presenter.origin", &["COLLATERAL_PRESENTER_ORIGIN"]),
        None => "derived (backend.base_url)".to_string(),
    };
    lines.push(render_line("presenter.origin", config.origin(), origin_source));
    lines.push(render_line(
        "presenter.copy_confirmation_secs",
        &config.presenter.copy_confirmation_secs.to_string(),
        sources.of(
            "presenter.copy_confirmation_secs",
            &["COLLATERAL_PRESENTER_COPY_CONFIRMATION_SECS"],
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        sources.of("logging.level", &["COLLATERAL_LOGGING_LEVEL", "COLLATERAL_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        sources.of("logging.format", &["COLLATERAL_LOGGING_FORMAT", "COLLATERAL_LOG_FORMAT"]),
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

struct Sources {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl Sources {
    fn of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("collateral.toml"), PathBuf::from("config/collateral.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
