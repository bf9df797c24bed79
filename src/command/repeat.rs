use super::{CancelBehavior, Command, CommandHandle};
use crate::scheduler::Scheduler;
use crate::subsystems::SubsystemId;
use alloc::vec::Vec;

/// Restarts its child every time it finishes; only ends when interrupted.
pub struct RepeatCommand {
    command: CommandHandle,
}

impl RepeatCommand {
    pub fn new(command: impl Into<CommandHandle>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Command for RepeatCommand {
    fn initialize(&mut self, scheduler: &Scheduler) {
        self.command.initialize(scheduler);
    }

    fn execute(&mut self, scheduler: &Scheduler) {
        self.command.execute(scheduler);
        if self.command.is_finished(scheduler) {
            self.command.end(false, scheduler);
            self.command.initialize(scheduler);
        }
    }

    fn end(&mut self, _interrupted: bool, scheduler: &Scheduler) {
        // The child is always mid-run here, so this end is an interruption
        self.command.end(true, scheduler);
    }

    fn requirements(&self) -> Vec<SubsystemId> {
        self.command.requirements()
    }

    fn cancel_behavior(&self) -> CancelBehavior {
        self.command.cancel_behavior()
    }

    fn name(&self) -> &str {
        "RepeatCommand"
    }
}
