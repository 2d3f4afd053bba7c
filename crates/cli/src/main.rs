use std::process::ExitCode;

fn main() -> ExitCode {
    collateral_cli::run()
}
