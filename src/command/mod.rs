//! Commands and the composition algebra built on them.
//!
//! A command is driven through `initialize → execute* → end(interrupted)` by
//! whoever owns its activation: the [`Scheduler`] for top-level commands, the
//! enclosing composite for children. Every lifecycle method receives the
//! scheduler as context so commands can read the host clock or schedule other
//! commands without holding a reference to it.

pub mod conditional;
pub mod functional;
pub mod parallel;
pub mod proxy;
pub mod repeat;
pub mod sequence;
pub mod wait;

pub use conditional::ConditionalCommand;
pub use functional::{FunctionalCommand, InstantCommand, LogCommand, RunCommand, WaitUntilCommand};
pub use parallel::{ParallelCommandGroup, ParallelRaceGroup};
pub use proxy::{ProxyCommand, ScheduleCommand};
pub use repeat::RepeatCommand;
pub use sequence::Sequence;
pub use wait::WaitCommand;

use crate::scheduler::Scheduler;
use crate::subsystems::SubsystemId;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side loses when a newly scheduled command conflicts with this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CancelBehavior {
    /// This command is interrupted in favour of the newcomer.
    #[default]
    CancelRunning,
    /// The newcomer is rejected while this command holds the reservation.
    CancelIncoming,
}

/// A unit of behavior that reserves subsystems while active.
///
/// `end` is called exactly once per `initialize`, with `interrupted == false`
/// only when the preceding `is_finished` returned true.
pub trait Command {
    fn initialize(&mut self, _scheduler: &Scheduler) {}

    fn execute(&mut self, _scheduler: &Scheduler) {}

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        false
    }

    fn end(&mut self, _interrupted: bool, _scheduler: &Scheduler) {}

    fn requirements(&self) -> Vec<SubsystemId> {
        Vec::new()
    }

    fn cancel_behavior(&self) -> CancelBehavior {
        CancelBehavior::CancelRunning
    }

    fn name(&self) -> &str {
        "Command"
    }
}

/// Shared, identity-compared handle to a command.
///
/// The scheduler, composites and triggers all refer to commands through
/// handles; two handles denote the same command exactly when [`ptr_eq`]
/// holds. Lifecycle calls borrow the command mutably, so a command must not
/// re-enter its own lifecycle (for example by cancelling itself from `end`).
///
/// [`ptr_eq`]: CommandHandle::ptr_eq
#[derive(Clone)]
pub struct CommandHandle(Rc<RefCell<dyn Command>>);

impl CommandHandle {
    pub fn new(command: impl Command + 'static) -> Self {
        Self(Rc::new(RefCell::new(command)))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
    }

    pub fn initialize(&self, scheduler: &Scheduler) {
        self.0.borrow_mut().initialize(scheduler);
    }

    pub fn execute(&self, scheduler: &Scheduler) {
        self.0.borrow_mut().execute(scheduler);
    }

    pub fn is_finished(&self, scheduler: &Scheduler) -> bool {
        self.0.borrow_mut().is_finished(scheduler)
    }

    pub fn end(&self, interrupted: bool, scheduler: &Scheduler) {
        self.0.borrow_mut().end(interrupted, scheduler);
    }

    pub fn requirements(&self) -> Vec<SubsystemId> {
        self.0.borrow().requirements()
    }

    pub fn cancel_behavior(&self) -> CancelBehavior {
        self.0.borrow().cancel_behavior()
    }

    /// The command's name, or a placeholder while it is mid-lifecycle.
    pub fn name(&self) -> String {
        self.0
            .try_borrow()
            .map_or_else(|_| String::from("<busy>"), |command| command.name().into())
    }
}

impl<T: Command + 'static> From<T> for CommandHandle {
    fn from(command: T) -> Self {
        Self::new(command)
    }
}

impl fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandHandle").field(&self.name()).finish()
    }
}

/// The decorator algebra, available on every command and handle.
pub trait CommandExt: Into<CommandHandle> + Sized {
    fn into_handle(self) -> CommandHandle {
        self.into()
    }

    /// Runs `self`, then `next`.
    fn and_then(self, next: impl Into<CommandHandle>) -> Sequence {
        Sequence::new([self.into(), next.into()])
    }

    /// Runs both until both finish. Panics if they share a requirement.
    fn with(self, other: impl Into<CommandHandle>) -> ParallelCommandGroup {
        ParallelCommandGroup::new([self.into(), other.into()])
    }

    /// Runs both until either finishes. Panics if they share a requirement.
    fn race(self, other: impl Into<CommandHandle>) -> ParallelRaceGroup {
        ParallelRaceGroup::new([self.into(), other.into()])
    }

    fn with_timeout(self, timeout: Duration) -> ParallelRaceGroup {
        ParallelRaceGroup::new([WaitCommand::new(timeout).into(), self.into()])
    }

    fn until(self, condition: impl FnMut() -> bool + 'static) -> ParallelRaceGroup {
        ParallelRaceGroup::new([WaitUntilCommand::new(condition).into(), self.into()])
    }

    fn repeatedly(self) -> RepeatCommand {
        RepeatCommand::new(self)
    }

    fn as_proxy(self) -> ProxyCommand {
        ProxyCommand::new(self)
    }
}

impl<T: Into<CommandHandle>> CommandExt for T {}

/// Builds a [`Sequence`] from any mix of commands and handles.
#[macro_export]
macro_rules! sequence {
    ($($command:expr),* $(,)?) => {
        $crate::command::Sequence::new([$($crate::command::CommandHandle::from($command)),*])
    };
}

/// Builds a [`ParallelCommandGroup`]. Panics on duplicate requirements.
#[macro_export]
macro_rules! parallel {
    ($($command:expr),* $(,)?) => {
        $crate::command::ParallelCommandGroup::new([$($crate::command::CommandHandle::from($command)),*])
    };
}

/// Builds a [`ParallelRaceGroup`]. Panics on duplicate requirements.
#[macro_export]
macro_rules! race {
    ($($command:expr),* $(,)?) => {
        $crate::command::ParallelRaceGroup::new([$($crate::command::CommandHandle::from($command)),*])
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    #[error("{group} children require {subsystem:?} more than once")]
    DuplicateRequirement {
        group: &'static str,
        subsystem: SubsystemId,
    },
}

/// Union of the children's requirements, first occurrence order, no duplicates.
pub(crate) fn union_requirements<'a>(
    children: impl IntoIterator<Item = &'a CommandHandle>,
) -> Vec<SubsystemId> {
    let mut union = Vec::new();
    for child in children {
        for requirement in child.requirements() {
            if !union.contains(&requirement) {
                union.push(requirement);
            }
        }
    }
    union
}

/// Rejects child sets where two children (or one child twice) reserve the same subsystem.
pub(crate) fn ensure_disjoint<'a>(
    group: &'static str,
    children: impl IntoIterator<Item = &'a CommandHandle>,
) -> Result<(), CompositionError> {
    let mut seen = Vec::new();
    for child in children {
        for requirement in child.requirements() {
            if seen.contains(&requirement) {
                return Err(CompositionError::DuplicateRequirement {
                    group,
                    subsystem: requirement,
                });
            }
            seen.push(requirement);
        }
    }
    Ok(())
}
