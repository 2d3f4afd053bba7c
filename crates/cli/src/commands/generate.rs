use collateral_core::{cancel_pair, DomainError, ResourceKind};

use crate::commands::{
    build_session, conclude, current_thread_runtime, load_config, CliSession, CommandResult,
    GlobalOptions,
};

/// One `--trip` argument: `name=price[=description]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripArg {
    pub name: String,
    pub price: String,
    pub description: Option<String>,
}

pub fn parse_trip_arg(raw: &str) -> Result<TripArg, String> {
    let mut parts = raw.splitn(3, '=');
    let name = parts.next().unwrap_or_default().to_string();
    let price = parts
        .next()
        .ok_or_else(|| format!("trip `{raw}` must look like name=price[=description]"))?
        .to_string();
    let description = parts.next().map(str::to_string);
    Ok(TripArg { name, price, description })
}

pub fn profile(options: &GlobalOptions, company: &str) -> CommandResult {
    generate("profile", options, ResourceKind::CompanyProfile, company, &[])
}

pub fn quote(options: &GlobalOptions, company: &str, trips: &[String]) -> CommandResult {
    let parsed: Result<Vec<TripArg>, String> =
        trips.iter().map(|raw| parse_trip_arg(raw)).collect();
    match parsed {
        Ok(parsed) => generate("quote", options, ResourceKind::Quotation, company, &parsed),
        Err(message) => CommandResult::failure("quote", "invalid_arguments", message, 2),
    }
}

fn generate(
    command: &str,
    options: &GlobalOptions,
    kind: ResourceKind,
    company: &str,
    trips: &[TripArg],
) -> CommandResult {
    let config = match load_config(command, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let (mut session, sink) = build_session(&config);
    session.select_output_type(kind);
    session.set_target_company(company);
    if let Err(error) = fill_trips(&mut session, trips) {
        return CommandResult::failure(command, "internal", error.to_string(), 1);
    }
    eprint!("{}", session.render());

    let outcome = runtime.block_on(async {
        let (handle, cancel) = cancel_pair();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });
        session.submit(&cancel).await
    });

    conclude(command, options, &mut session, &sink, outcome)
}

/// Writes the trip arguments into the session, reusing the blank row a
/// quotation starts with.
fn fill_trips(session: &mut CliSession, trips: &[TripArg]) -> Result<(), DomainError> {
    let mut seeded = session.trips().entries().first().map(|entry| entry.id);
    for trip in trips {
        let id = match seeded.take() {
            Some(id) => id,
            None => session.trips_mut().add_trip(),
        };
        let rows = session.trips_mut();
        rows.set_name(id, trip.name.as_str())?;
        rows.set_price_input(id, &trip.price)?;
        if let Some(description) = &trip.description {
            rows.set_description(id, description.as_str())?;
        }
    }
    Ok(())
}
