pub mod config;
pub mod generate;
pub mod resume;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use collateral_client::HttpRecordStore;
use collateral_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use collateral_core::{
    AuditEvent, CopyButton, CopyOutcome, InMemoryAuditSink, InterfaceError, ResultView, Session,
    TwoPhasePersister,
};

use crate::clipboard::Osc52Clipboard;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub copy: bool,
    pub audit: bool,
}

impl GlobalOptions {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides { base_url: self.base_url.clone(), ..Default::default() },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    audit: Vec<AuditEvent>,
}

impl CommandOutcome {
    fn new(command: &str, status: &str, error_class: Option<&str>, message: String) -> Self {
        Self {
            command: command.to_string(),
            status: status.to_string(),
            error_class: error_class.map(str::to_string),
            message,
            url: None,
            id: None,
            audit: Vec::new(),
        }
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome::new(command, "ok", None, message.into());
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome::new(command, "error", Some(error_class), message.into());
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn linked(command: &str, view: &ResultView, audit: Vec<AuditEvent>) -> Self {
        let mut payload = CommandOutcome::new(
            command,
            "ok",
            None,
            format!("{} link generated", view.kind.as_str()),
        );
        payload.url = Some(view.absolute_url.clone());
        payload.id = Some(view.record_id.to_string());
        payload.audit = audit;
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    fn interface_failure(
        command: &str,
        error: &InterfaceError,
        partial_id: Option<String>,
        audit: Vec<AuditEvent>,
    ) -> Self {
        let (error_class, exit_code) = match error {
            InterfaceError::BadRequest { .. } => ("validation", 2),
            InterfaceError::ServiceUnavailable { .. } => ("persistence", 3),
            InterfaceError::Recoverable { .. } => ("partial_persistence", 4),
            InterfaceError::Internal { .. } => ("internal", 1),
        };
        let mut payload = CommandOutcome::new(
            command,
            "error",
            Some(error_class),
            error.user_message().to_string(),
        );
        payload.id = partial_id;
        payload.audit = audit;
        Self { exit_code, output: serialize_payload(payload) }
    }
}

pub(crate) type CliSession = Session<HttpRecordStore>;

/// Session wired to the configured backend plus the sink collecting its audit trail.
pub(crate) fn build_session(config: &AppConfig) -> (CliSession, Arc<InMemoryAuditSink>) {
    let store = HttpRecordStore::new(&config.backend.base_url);
    let persister = TwoPhasePersister::new(store, config.retry_policy(), config.request_timeout());
    let sink = Arc::new(InMemoryAuditSink::default());
    let session = Session::new(persister, config.origin())
        .with_copy_button(CopyButton::new(config.copy_confirmation()))
        .with_audit_sink(sink.clone());
    (session, sink)
}

pub(crate) fn load_config(
    command: &str,
    options: &GlobalOptions,
) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.load_options()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn current_thread_runtime(
    command: &str,
) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            1,
        )
    })
}

/// Turns a finished submission into the command's JSON line, copying the
/// link first when `--copy` was given.
pub(crate) fn conclude(
    command: &str,
    options: &GlobalOptions,
    session: &mut CliSession,
    sink: &InMemoryAuditSink,
    outcome: Result<ResultView, InterfaceError>,
) -> CommandResult {
    let audit = if options.audit { sink.events() } else { Vec::new() };
    match outcome {
        Ok(view) => {
            if options.copy {
                let mut clipboard = Osc52Clipboard::stderr();
                if let Some(CopyOutcome::ManualCopy { prompt }) =
                    session.copy_link(&mut clipboard, std::time::Instant::now())
                {
                    eprintln!("{prompt}");
                }
            }
            CommandResult::linked(command, &view, audit)
        }
        Err(error) => {
            let partial_id = session.partial().map(|partial| partial.id.to_string());
            CommandResult::interface_failure(command, &error, partial_id, audit)
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
