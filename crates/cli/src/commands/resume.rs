use collateral_core::{cancel_pair, relative_link, PartialRecord, RecordId, ResourceKind};
use uuid::Uuid;

use crate::commands::{
    build_session, conclude, current_thread_runtime, load_config, CommandResult, GlobalOptions,
};

/// Attaches the link to a record an earlier run created but could not patch.
pub fn run(options: &GlobalOptions, kind: ResourceKind, id: &str, company: &str) -> CommandResult {
    if id.trim().is_empty() || company.trim().is_empty() {
        return CommandResult::failure(
            "resume",
            "validation",
            "Please fill in all required fields",
            2,
        );
    }

    let config = match load_config("resume", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("resume") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let id = RecordId(id.trim().to_string());
    let partial = PartialRecord {
        kind,
        pending_url: relative_link(kind, company.trim(), &id),
        id,
        target_company: company.trim().to_string(),
        reason: "resumed from the command line".to_string(),
    };

    let (mut session, sink) = build_session(&config);
    let correlation_id = Uuid::new_v4().to_string();
    let outcome = runtime.block_on(async {
        let (handle, cancel) = cancel_pair();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });
        session.resume(partial, &cancel, &correlation_id).await
    });

    conclude("resume", options, &mut session, &sink, outcome)
}
