use super::{union_requirements, Command, CommandHandle};
use crate::scheduler::Scheduler;
use crate::subsystems::SubsystemId;
use alloc::vec::Vec;

/// Runs its children one after another, each starting the tick its predecessor ends.
///
/// Children may share requirements; the sequence reserves their union for
/// its whole run, including subsystems only a later child uses.
pub struct Sequence {
    children: Vec<CommandHandle>,
    index: usize,
}

impl Sequence {
    pub fn new(children: impl IntoIterator<Item = CommandHandle>) -> Self {
        Self {
            children: children.into_iter().collect(),
            index: 0,
        }
    }

    /// Index of the running child; equals the child count once finished.
    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl Command for Sequence {
    fn initialize(&mut self, scheduler: &Scheduler) {
        self.index = 0;
        if let Some(first) = self.children.first() {
            first.initialize(scheduler);
        }
    }

    fn execute(&mut self, scheduler: &Scheduler) {
        let Some(current) = self.children.get(self.index).cloned() else {
            return;
        };

        current.execute(scheduler);
        if current.is_finished(scheduler) {
            current.end(false, scheduler);
            self.index += 1;
            if let Some(next) = self.children.get(self.index) {
                next.initialize(scheduler);
            }
        }
    }

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        self.index >= self.children.len()
    }

    fn end(&mut self, interrupted: bool, scheduler: &Scheduler) {
        // Children past the index were never initialized
        if let Some(current) = self.children.get(self.index) {
            current.end(interrupted, scheduler);
        }
    }

    fn requirements(&self) -> Vec<SubsystemId> {
        union_requirements(&self.children)
    }

    fn name(&self) -> &str {
        "Sequence"
    }
}
