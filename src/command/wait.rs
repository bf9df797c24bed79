use super::Command;
use crate::scheduler::Scheduler;
use core::time::Duration;

/// Finishes once strictly more than `duration` has elapsed since `initialize`.
#[derive(Debug, Clone)]
pub struct WaitCommand {
    duration_ms: u64,
    start_ms: u64,
}

impl WaitCommand {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            start_ms: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Command for WaitCommand {
    fn initialize(&mut self, scheduler: &Scheduler) {
        self.start_ms = scheduler.now_ms();
    }

    fn is_finished(&mut self, scheduler: &Scheduler) -> bool {
        scheduler.now_ms().saturating_sub(self.start_ms) > self.duration_ms
    }

    fn name(&self) -> &str {
        "WaitCommand"
    }
}
