//! Entry point for the example persistent application.

use std::io::{self, Write};
use std::process::ExitCode;

use txproc_app::{StructuredHealthReporter, SystemConfigLoader, bootstrap_with};
use txproc_example::{APP_NAME, Acknowledger};

fn main() -> ExitCode {
    let runtime = match bootstrap_with(
        APP_NAME,
        &SystemConfigLoader,
        &StructuredHealthReporter::new(),
    ) {
        Ok(runtime) => runtime,
        Err(error) => {
            drop(writeln!(io::stderr(), "{APP_NAME}: {error}"));
            return ExitCode::FAILURE;
        }
    };

    match runtime.run(Acknowledger::default()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "dispatch loop failed");
            ExitCode::FAILURE
        }
    }
}
