mod errors;
pub(crate) mod launch;
mod supervisor;

pub use errors::LaunchError;
pub use launch::{SystemSubsystems, run_daemon};
pub use supervisor::IdleSupervisor;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
