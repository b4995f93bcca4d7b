//! Entry point for the storage volume daemon.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match voldd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "voldd::process", error = %error, "voldd failed to start");
            // Telemetry may not be installed when configuration fails.
            if writeln!(io::stderr().lock(), "voldd: {error}").is_err() {
                tracing::debug!(target: "voldd::process", "stderr unavailable");
            }
            ExitCode::FAILURE
        }
    }
}
