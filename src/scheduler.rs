//! # Command Scheduler
//!
//! Single-threaded, cooperative, tick-driven multiplexing of commands over
//! exclusively reserved subsystems.
//!
//! ## Tick Algorithm
//!
//! Each call to [`Scheduler::tick`]:
//! 1. **Subsystem periodics**: every registered subsystem, in registration order
//! 2. **Default event loop**: polled unconditionally
//! 3. **Teleop event loop**: polled unless the host is autonomous or disabled
//! 4. **Execute pass**: every active command (snapshot, insertion order) runs
//!    `execute`; finished commands get `end(false)` and release their subsystems
//! 5. **Deferred requests**: cancels, then schedules, buffered during step 4
//! 6. **Default sweep**: each idle registered subsystem gets its default command
//!
//! ## Reservation Policy
//!
//! Scheduling a command interrupts every active command holding one of its
//! requirements, unless any of them is `CancelIncoming`, in which case the
//! newcomer is silently rejected. Rejections are never surfaced as errors;
//! they are logged at `debug` and counted in [`SchedulerStats`].

use crate::command::{CancelBehavior, CommandHandle};
use crate::event_loop::EventLoop;
use crate::host::{HostRuntime, SystemHost};
use crate::subsystems::{FaultType, Subsystem, SubsystemId, SubsystemRef};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub const MAX_SUBSYSTEMS: usize = 16;

static_assertions::const_assert!(MAX_SUBSYSTEMS > 0);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("subsystem `{0}` is already registered")]
    DuplicateSubsystem(String),
    #[error("subsystem registry full ({0} entries)")]
    RegistryFull(usize),
    #[error("subsystem `{name}` faulted during periodic: {fault}")]
    SubsystemFault {
        name: String,
        #[source]
        fault: FaultType,
    },
}

/// A broken reservation invariant, reported by [`Scheduler::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("active command `{command}` requires {subsystem:?} but does not hold it")]
    UnreservedRequirement { command: String, subsystem: SubsystemId },
    #[error("{subsystem:?} is reserved by `{command}`, which is not active")]
    InactiveOwner { command: String, subsystem: SubsystemId },
    #[error("registered subsystem `{name}` is idle after the default sweep")]
    IdleSubsystem { name: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub total_scheduled: u32,
    pub total_rejected: u32,
    pub total_finished: u32,
    pub total_interrupted: u32,
    pub currently_active: u16,
}

struct Registration {
    id: SubsystemId,
    subsystem: SubsystemRef,
    default_command: CommandHandle,
}

#[derive(Default)]
struct SchedulerState {
    registered: heapless::Vec<Registration, MAX_SUBSYSTEMS>,
    reservations: Vec<(SubsystemId, CommandHandle)>,
    active: Vec<CommandHandle>,
    in_tick: bool,
    // Set while `schedule` ends conflicting holders and initializes the newcomer
    admitting: bool,
    pending_schedule: Vec<CommandHandle>,
    nested_schedule: Vec<CommandHandle>,
    pending_cancel: Vec<CommandHandle>,
    stats: SchedulerStats,
}

impl SchedulerState {
    fn is_active(&self, command: &CommandHandle) -> bool {
        self.active.iter().any(|active| active.ptr_eq(command))
    }

    fn owner_of(&self, subsystem: SubsystemId) -> Option<&CommandHandle> {
        self.reservations
            .iter()
            .find(|(id, _)| *id == subsystem)
            .map(|(_, owner)| owner)
    }

    fn reserve(&mut self, subsystem: SubsystemId, command: &CommandHandle) {
        match self.reservations.iter_mut().find(|(id, _)| *id == subsystem) {
            Some((_, owner)) => *owner = command.clone(),
            None => self.reservations.push((subsystem, command.clone())),
        }
    }

    /// Drops `command` from the active set along with everything it reserved.
    fn retire(&mut self, command: &CommandHandle) {
        self.active.retain(|active| !active.ptr_eq(command));
        self.reservations.retain(|(_, owner)| !owner.ptr_eq(command));
        self.stats.currently_active = self.active.len() as u16;
    }
}

/// Clears `in_tick` when the execute pass ends, even by unwinding.
struct ExecutePass<'a> {
    state: &'a RefCell<SchedulerState>,
}

impl<'a> ExecutePass<'a> {
    fn begin(state: &'a RefCell<SchedulerState>) -> Self {
        state.borrow_mut().in_tick = true;
        Self { state }
    }
}

impl Drop for ExecutePass<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.in_tick = false;
        }
    }
}

/// The command scheduler. Owned by the control loop and passed by reference
/// to every command lifecycle call.
///
/// All methods take `&self`: commands, event-loop bindings and subsystem
/// hooks re-enter the scheduler while it is ticking. No internal borrow is
/// held across a call into user code.
pub struct Scheduler {
    state: RefCell<SchedulerState>,
    host: Box<dyn HostRuntime>,
    default_loop: EventLoop,
    teleop_loop: EventLoop,
}

static_assertions::assert_not_impl_any!(Scheduler: Send, Sync);

impl Scheduler {
    pub fn new(host: impl HostRuntime + 'static) -> Self {
        Self {
            state: RefCell::new(SchedulerState::default()),
            host: Box::new(host),
            default_loop: EventLoop::new(),
            teleop_loop: EventLoop::new(),
        }
    }

    /// Registers `subsystem` with the command to run whenever nothing else requires it.
    ///
    /// Nothing is scheduled until the next tick's default sweep.
    pub fn register_subsystem<S: Subsystem + 'static>(
        &self,
        subsystem: &Rc<RefCell<S>>,
        default_command: impl Into<CommandHandle>,
    ) -> Result<(), SchedulerError> {
        let id = SubsystemId::of(subsystem);
        let name = subsystem.borrow().name().to_string();
        let mut state = self.state.borrow_mut();

        if state.registered.iter().any(|registration| registration.id == id) {
            return Err(SchedulerError::DuplicateSubsystem(name));
        }

        let erased: SubsystemRef = subsystem.clone();
        state
            .registered
            .push(Registration {
                id,
                subsystem: erased,
                default_command: default_command.into(),
            })
            .map_err(|_| SchedulerError::RegistryFull(MAX_SUBSYSTEMS))?;

        debug!(subsystem = %name, "registered subsystem");
        Ok(())
    }

    /// Activates `command`, preempting conflicting commands where allowed.
    ///
    /// No-op when the command is already active, the host is disabled, or a
    /// conflicting holder is `CancelIncoming`. During the execute pass the
    /// request is buffered and re-evaluated once the pass ends.
    ///
    /// Schedules issued from the `end` of a preempted holder or from the
    /// newcomer's `initialize` are applied once the newcomer is active, so
    /// they see its reservations. A proxied child that needs a subsystem its
    /// own group reserves therefore interrupts the group.
    pub fn schedule(&self, command: &CommandHandle) {
        {
            let mut state = self.state.borrow_mut();
            if state.is_active(command) {
                return;
            }
            if state.in_tick {
                trace!(command = %command.name(), "deferring schedule to end of tick");
                state.pending_schedule.push(command.clone());
                return;
            }
            if state.admitting {
                trace!(command = %command.name(), "deferring nested schedule");
                state.nested_schedule.push(command.clone());
                return;
            }
        }

        if self.host.is_disabled() {
            trace!(command = %command.name(), "host disabled, schedule ignored");
            return;
        }

        let requirements = command.requirements();
        let conflicts: Vec<CommandHandle> = {
            let state = self.state.borrow();
            state
                .active
                .iter()
                .filter(|active| {
                    state
                        .reservations
                        .iter()
                        .any(|(id, owner)| owner.ptr_eq(active) && requirements.contains(id))
                })
                .cloned()
                .collect()
        };

        if conflicts
            .iter()
            .any(|holder| holder.cancel_behavior() == CancelBehavior::CancelIncoming)
        {
            debug!(command = %command.name(), "rejected by a CancelIncoming holder");
            self.state.borrow_mut().stats.total_rejected += 1;
            return;
        }

        self.state.borrow_mut().admitting = true;

        for holder in &conflicts {
            // Ending an earlier holder may already have cancelled this one
            if !self.state.borrow().is_active(holder) {
                continue;
            }
            debug!(command = %holder.name(), by = %command.name(), "preempted");
            holder.end(true, self);
            let mut state = self.state.borrow_mut();
            state.retire(holder);
            state.stats.total_interrupted += 1;
        }

        {
            let mut state = self.state.borrow_mut();
            for requirement in &requirements {
                state.reserve(*requirement, command);
            }
        }

        command.initialize(self);

        let nested = {
            let mut state = self.state.borrow_mut();
            state.active.push(command.clone());
            state.stats.total_scheduled += 1;
            state.stats.currently_active = state.active.len() as u16;
            state.admitting = false;
            core::mem::take(&mut state.nested_schedule)
        };
        debug!(command = %command.name(), "scheduled");

        for nested_command in &nested {
            self.schedule(nested_command);
        }
    }

    /// Interrupts `command` with `end(true)` if it is active.
    ///
    /// During the execute pass the request is only buffered; it is applied,
    /// before any buffered schedule, once the pass ends.
    pub fn cancel(&self, command: &CommandHandle) {
        {
            let mut state = self.state.borrow_mut();
            if state.in_tick {
                trace!(command = %command.name(), "deferring cancel to end of tick");
                state.pending_cancel.push(command.clone());
                return;
            }
            if !state.is_active(command) {
                return;
            }
        }

        command.end(true, self);

        let mut state = self.state.borrow_mut();
        state.retire(command);
        state.stats.total_interrupted += 1;
        debug!(command = %command.name(), "cancelled");
    }

    /// Cancels every active command, oldest first.
    pub fn cancel_all(&self) {
        for command in self.active_commands() {
            self.cancel(&command);
        }
    }

    pub fn is_scheduled(&self, command: &CommandHandle) -> bool {
        self.state.borrow().is_active(command)
    }

    /// The active command currently reserving `subsystem`, if any.
    pub fn requiring(&self, subsystem: impl Into<SubsystemId>) -> Option<CommandHandle> {
        self.state.borrow().owner_of(subsystem.into()).cloned()
    }

    pub fn active_commands(&self) -> Vec<CommandHandle> {
        self.state.borrow().active.clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.state.borrow().stats
    }

    pub fn now_ms(&self) -> u64 {
        self.host.now_ms()
    }

    pub fn host(&self) -> &dyn HostRuntime {
        self.host.as_ref()
    }

    pub fn default_event_loop(&self) -> EventLoop {
        self.default_loop.clone()
    }

    pub fn teleop_event_loop(&self) -> EventLoop {
        self.teleop_loop.clone()
    }

    /// Advances every subsystem and command by one step.
    ///
    /// A subsystem fault aborts the tick before any command runs.
    pub fn tick(&self) -> Result<(), SchedulerError> {
        let subsystems: Vec<SubsystemRef> = {
            let mut state = self.state.borrow_mut();
            state.stats.ticks += 1;
            trace!(tick = state.stats.ticks, "tick");
            state
                .registered
                .iter()
                .map(|registration| Rc::clone(&registration.subsystem))
                .collect()
        };

        for subsystem in &subsystems {
            let mut subsystem = subsystem.borrow_mut();
            subsystem
                .periodic()
                .map_err(|fault| SchedulerError::SubsystemFault {
                    name: subsystem.name().to_string(),
                    fault,
                })?;
        }

        self.default_loop.poll(self);
        if !self.host.is_autonomous() && !self.host.is_disabled() {
            self.teleop_loop.poll(self);
        }

        self.run_execute_pass();
        self.drain_pending();
        self.schedule_defaults();
        Ok(())
    }

    fn run_execute_pass(&self) {
        let _pass = ExecutePass::begin(&self.state);
        let snapshot = self.active_commands();

        for command in &snapshot {
            command.execute(self);
            if command.is_finished(self) {
                command.end(false, self);
                let mut state = self.state.borrow_mut();
                state.retire(command);
                state.stats.total_finished += 1;
                debug!(command = %command.name(), "finished");
            }
        }
    }

    fn drain_pending(&self) {
        let (cancels, schedules) = {
            let mut state = self.state.borrow_mut();
            (
                core::mem::take(&mut state.pending_cancel),
                core::mem::take(&mut state.pending_schedule),
            )
        };

        for command in &cancels {
            self.cancel(command);
        }
        for command in &schedules {
            self.schedule(command);
        }
    }

    fn schedule_defaults(&self) {
        let count = self.state.borrow().registered.len();
        for index in 0..count {
            // Checked one at a time: a default may claim several subsystems
            let default_command = {
                let state = self.state.borrow();
                let registration = &state.registered[index];
                if state.owner_of(registration.id).is_some() {
                    continue;
                }
                registration.default_command.clone()
            };
            self.schedule(&default_command);
        }
    }

    /// Verifies the reservation invariants that must hold between ticks.
    ///
    /// The idle-subsystem check is skipped while the host is disabled.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let state = self.state.borrow();

        for command in &state.active {
            for subsystem in command.requirements() {
                if !state.owner_of(subsystem).is_some_and(|owner| owner.ptr_eq(command)) {
                    return Err(InvariantViolation::UnreservedRequirement {
                        command: command.name(),
                        subsystem,
                    });
                }
            }
        }

        for (subsystem, owner) in &state.reservations {
            if !state.is_active(owner) {
                return Err(InvariantViolation::InactiveOwner {
                    command: owner.name(),
                    subsystem: *subsystem,
                });
            }
        }

        if !self.host.is_disabled() {
            for registration in &state.registered {
                if state.owner_of(registration.id).is_none() {
                    return Err(InvariantViolation::IdleSubsystem {
                        name: registration.subsystem.borrow().name().to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SystemHost::new())
    }
}
