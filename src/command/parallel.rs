//! Groups that run their children side by side.
//!
//! Children of a parallel group must not share requirements: each group
//! reserves the union of its children's subsystems and checks at
//! construction that no subsystem is claimed twice.

use super::{ensure_disjoint, union_requirements, Command, CommandHandle, CompositionError};
use crate::scheduler::Scheduler;
use crate::subsystems::SubsystemId;
use alloc::vec::Vec;

struct Child {
    command: CommandHandle,
    running: bool,
}

fn collect_children(
    group: &'static str,
    children: impl IntoIterator<Item = CommandHandle>,
) -> Result<Vec<Child>, CompositionError> {
    let children: Vec<Child> = children
        .into_iter()
        .map(|command| Child {
            command,
            running: true,
        })
        .collect();
    ensure_disjoint(group, children.iter().map(|child| &child.command))?;
    Ok(children)
}

/// Runs all children at once and finishes when every child has finished.
pub struct ParallelCommandGroup {
    children: Vec<Child>,
}

impl ParallelCommandGroup {
    /// # Panics
    ///
    /// If two children require the same subsystem.
    pub fn new(children: impl IntoIterator<Item = CommandHandle>) -> Self {
        Self::try_new(children).unwrap_or_else(|error| panic!("{error}"))
    }

    pub fn try_new(children: impl IntoIterator<Item = CommandHandle>) -> Result<Self, CompositionError> {
        Ok(Self {
            children: collect_children("ParallelCommandGroup", children)?,
        })
    }
}

impl Command for ParallelCommandGroup {
    fn initialize(&mut self, scheduler: &Scheduler) {
        for child in &mut self.children {
            child.command.initialize(scheduler);
            child.running = true;
        }
    }

    fn execute(&mut self, scheduler: &Scheduler) {
        for child in self.children.iter_mut().filter(|child| child.running) {
            child.command.execute(scheduler);
            if child.command.is_finished(scheduler) {
                child.running = false;
                child.command.end(false, scheduler);
            }
        }
    }

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        self.children.iter().all(|child| !child.running)
    }

    fn end(&mut self, interrupted: bool, scheduler: &Scheduler) {
        // Finished children were already ended as they completed
        if interrupted {
            for child in self.children.iter_mut().filter(|child| child.running) {
                child.running = false;
                child.command.end(true, scheduler);
            }
        }
    }

    fn requirements(&self) -> Vec<SubsystemId> {
        union_requirements(self.children.iter().map(|child| &child.command))
    }

    fn name(&self) -> &str {
        "ParallelCommandGroup"
    }
}

/// Runs all children at once and finishes as soon as any child finishes.
pub struct ParallelRaceGroup {
    children: Vec<Child>,
    done: bool,
}

impl ParallelRaceGroup {
    /// # Panics
    ///
    /// If two children require the same subsystem.
    pub fn new(children: impl IntoIterator<Item = CommandHandle>) -> Self {
        Self::try_new(children).unwrap_or_else(|error| panic!("{error}"))
    }

    pub fn try_new(children: impl IntoIterator<Item = CommandHandle>) -> Result<Self, CompositionError> {
        Ok(Self {
            children: collect_children("ParallelRaceGroup", children)?,
            done: false,
        })
    }
}

impl Command for ParallelRaceGroup {
    fn initialize(&mut self, scheduler: &Scheduler) {
        self.done = false;
        for child in &mut self.children {
            child.command.initialize(scheduler);
            child.running = true;
        }
    }

    fn execute(&mut self, scheduler: &Scheduler) {
        // Every child still gets its tick, even after another one wins
        for child in self.children.iter_mut().filter(|child| child.running) {
            child.command.execute(scheduler);
            if child.command.is_finished(scheduler) {
                child.running = false;
                self.done = true;
                child.command.end(false, scheduler);
            }
        }
    }

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        self.done || self.children.is_empty()
    }

    fn end(&mut self, _interrupted: bool, scheduler: &Scheduler) {
        for child in self.children.iter_mut().filter(|child| child.running) {
            child.running = false;
            let finished = child.command.is_finished(scheduler);
            child.command.end(!finished, scheduler);
        }
    }

    fn requirements(&self) -> Vec<SubsystemId> {
        union_requirements(self.children.iter().map(|child| &child.command))
    }

    fn name(&self) -> &str {
        "ParallelRaceGroup"
    }
}
