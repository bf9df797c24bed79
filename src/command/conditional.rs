use super::{Command, CommandHandle};
use crate::scheduler::Scheduler;
use crate::subsystems::SubsystemId;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Picks one of two branches when initialized and then behaves exactly like it.
pub struct ConditionalCommand {
    on_true: CommandHandle,
    on_false: CommandHandle,
    condition: Box<dyn Fn() -> bool>,
    selected: Option<CommandHandle>,
}

impl ConditionalCommand {
    pub fn new(
        on_true: impl Into<CommandHandle>,
        on_false: impl Into<CommandHandle>,
        condition: impl Fn() -> bool + 'static,
    ) -> Self {
        Self {
            on_true: on_true.into(),
            on_false: on_false.into(),
            condition: Box::new(condition),
            selected: None,
        }
    }

    fn choose(&self) -> &CommandHandle {
        if (self.condition)() {
            &self.on_true
        } else {
            &self.on_false
        }
    }
}

impl Command for ConditionalCommand {
    fn initialize(&mut self, scheduler: &Scheduler) {
        let selected = self.choose().clone();
        selected.initialize(scheduler);
        self.selected = Some(selected);
    }

    fn execute(&mut self, scheduler: &Scheduler) {
        if let Some(selected) = &self.selected {
            selected.execute(scheduler);
        }
    }

    fn is_finished(&mut self, scheduler: &Scheduler) -> bool {
        self.selected
            .as_ref()
            .map_or(true, |selected| selected.is_finished(scheduler))
    }

    fn end(&mut self, interrupted: bool, scheduler: &Scheduler) {
        if let Some(selected) = self.selected.take() {
            selected.end(interrupted, scheduler);
        }
    }

    /// The running branch's requirements, or, before initialization, those of
    /// the branch the condition would pick right now.
    fn requirements(&self) -> Vec<SubsystemId> {
        match &self.selected {
            Some(selected) => selected.requirements(),
            None => self.choose().requirements(),
        }
    }

    fn name(&self) -> &str {
        "ConditionalCommand"
    }
}
