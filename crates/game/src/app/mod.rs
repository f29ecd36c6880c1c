mod bootstrap;
mod gameplay;
mod loop_runner;

use std::process::ExitCode;

pub(crate) fn run() -> ExitCode {
    match bootstrap::build_app() {
        Ok(app) => loop_runner::run(app),
        Err(error) => {
            tracing::error!(error = %error, "bootstrap_failed");
            ExitCode::FAILURE
        }
    }
}
