use std::thread;
use std::time::Duration;

use crate::subsystems::Supervisor;

const IDLE_INTERVAL: Duration = Duration::from_secs(1000);

/// Parks the main thread while background subsystems do the work.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleSupervisor;

impl Supervisor for IdleSupervisor {
    fn supervise(&self) {
        loop {
            thread::sleep(IDLE_INTERVAL);
        }
    }
}
