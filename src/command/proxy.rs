//! Commands that hand other commands to the scheduler instead of running them.

use super::{Command, CommandHandle};
use crate::scheduler::Scheduler;
use alloc::boxed::Box;

/// Schedules its inner command independently and finishes when that command
/// is no longer scheduled.
///
/// A proxy declares no requirements, so a composite holding one does not
/// reserve the inner command's subsystems; they are taken only while the
/// inner command actually runs. Use it sparingly: the inner command can be
/// preempted by anything that wants those subsystems.
pub struct ProxyCommand {
    supplier: Box<dyn FnMut() -> CommandHandle>,
    inner: Option<CommandHandle>,
}

impl ProxyCommand {
    pub fn new(command: impl Into<CommandHandle>) -> Self {
        let command = command.into();
        Self::from_supplier(move || command.clone())
    }

    /// The supplier is called at every `initialize` to pick the command to schedule.
    pub fn from_supplier(supplier: impl FnMut() -> CommandHandle + 'static) -> Self {
        Self {
            supplier: Box::new(supplier),
            inner: None,
        }
    }
}

impl Command for ProxyCommand {
    fn initialize(&mut self, scheduler: &Scheduler) {
        let inner = (self.supplier)();
        scheduler.schedule(&inner);
        self.inner = Some(inner);
    }

    fn is_finished(&mut self, scheduler: &Scheduler) -> bool {
        self.inner
            .as_ref()
            .map_or(true, |inner| !scheduler.is_scheduled(inner))
    }

    fn end(&mut self, interrupted: bool, scheduler: &Scheduler) {
        if let Some(inner) = self.inner.take() {
            if interrupted {
                scheduler.cancel(&inner);
            }
        }
    }

    fn name(&self) -> &str {
        "ProxyCommand"
    }
}

/// Fire-and-forget: schedules its target when initialized and finishes at once.
pub struct ScheduleCommand {
    target: CommandHandle,
}

impl ScheduleCommand {
    pub fn new(target: impl Into<CommandHandle>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Command for ScheduleCommand {
    fn initialize(&mut self, scheduler: &Scheduler) {
        scheduler.schedule(&self.target);
    }

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        true
    }

    fn name(&self) -> &str {
        "ScheduleCommand"
    }
}
