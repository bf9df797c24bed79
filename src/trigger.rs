//! Edge-triggered bindings from boolean conditions to scheduler actions.
//!
//! Each bind method installs one stateful callback into the trigger's event
//! loop. The callback remembers the condition's previous value, seeded by
//! evaluating the condition at bind time, and acts on the edge it sees at
//! each poll.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use cmdsched::command::{CommandHandle, RunCommand};
//! use cmdsched::host::ManualHost;
//! use cmdsched::{Scheduler, Trigger};
//!
//! let scheduler = Scheduler::new(ManualHost::new());
//! let pressed = Rc::new(Cell::new(false));
//! let button = pressed.clone();
//! let spin: CommandHandle = RunCommand::new(|| {}, []).into();
//!
//! Trigger::new(&scheduler, move || button.get()).while_true(spin.clone());
//!
//! pressed.set(true);
//! scheduler.tick().unwrap();
//! assert!(scheduler.is_scheduled(&spin));
//! ```

use crate::command::CommandHandle;
use crate::event_loop::EventLoop;
use crate::scheduler::Scheduler;
use alloc::rc::Rc;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Rising,
    Falling,
    Steady,
}

/// Previous-value memory for one binding.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    pub(crate) fn new(initial: bool) -> Self {
        Self { previous: initial }
    }

    pub(crate) fn update(&mut self, current: bool) -> Edge {
        let edge = match (self.previous, current) {
            (false, true) => Edge::Rising,
            (true, false) => Edge::Falling,
            _ => Edge::Steady,
        };
        self.previous = current;
        edge
    }
}

fn toggle(scheduler: &Scheduler, command: &CommandHandle) {
    if scheduler.is_scheduled(command) {
        scheduler.cancel(command);
    } else {
        scheduler.schedule(command);
    }
}

/// A boolean condition bound into an event loop.
#[derive(Clone)]
pub struct Trigger {
    condition: Rc<dyn Fn() -> bool>,
    event_loop: EventLoop,
}

impl Trigger {
    /// Binds into the scheduler's default loop, polled every tick.
    pub fn new(scheduler: &Scheduler, condition: impl Fn() -> bool + 'static) -> Self {
        Self::on_loop(&scheduler.default_event_loop(), condition)
    }

    /// Binds into the teleop loop, polled only outside autonomous and disabled.
    /// Controller buttons belong here.
    pub fn teleop(scheduler: &Scheduler, condition: impl Fn() -> bool + 'static) -> Self {
        Self::on_loop(&scheduler.teleop_event_loop(), condition)
    }

    pub fn on_loop(event_loop: &EventLoop, condition: impl Fn() -> bool + 'static) -> Self {
        Self {
            condition: Rc::new(condition),
            event_loop: event_loop.clone(),
        }
    }

    /// Current value of the condition.
    pub fn get(&self) -> bool {
        (self.condition)()
    }

    fn bind_edges(&self, mut action: impl FnMut(Edge, &Scheduler) + 'static) -> &Self {
        let condition = Rc::clone(&self.condition);
        let mut detector = EdgeDetector::new(condition());
        self.event_loop.bind(move |scheduler| {
            let edge = detector.update(condition());
            action(edge, scheduler);
        });
        self
    }

    /// Schedules `command` whenever the condition changes.
    pub fn on_change(&self, command: impl Into<CommandHandle>) -> &Self {
        let command = command.into();
        self.bind_edges(move |edge, scheduler| {
            if edge != Edge::Steady {
                scheduler.schedule(&command);
            }
        })
    }

    pub fn on_true(&self, command: impl Into<CommandHandle>) -> &Self {
        let command = command.into();
        self.bind_edges(move |edge, scheduler| {
            if edge == Edge::Rising {
                scheduler.schedule(&command);
            }
        })
    }

    pub fn on_false(&self, command: impl Into<CommandHandle>) -> &Self {
        let command = command.into();
        self.bind_edges(move |edge, scheduler| {
            if edge == Edge::Falling {
                scheduler.schedule(&command);
            }
        })
    }

    /// Schedules on the rising edge and cancels on the falling edge.
    ///
    /// A command that finishes while the condition holds is not restarted;
    /// wrap it with `repeatedly()` for that.
    pub fn while_true(&self, command: impl Into<CommandHandle>) -> &Self {
        let command = command.into();
        self.bind_edges(move |edge, scheduler| match edge {
            Edge::Rising => scheduler.schedule(&command),
            Edge::Falling => scheduler.cancel(&command),
            Edge::Steady => {}
        })
    }

    pub fn while_false(&self, command: impl Into<CommandHandle>) -> &Self {
        let command = command.into();
        self.bind_edges(move |edge, scheduler| match edge {
            Edge::Falling => scheduler.schedule(&command),
            Edge::Rising => scheduler.cancel(&command),
            Edge::Steady => {}
        })
    }

    pub fn toggle_on_true(&self, command: impl Into<CommandHandle>) -> &Self {
        let command = command.into();
        self.bind_edges(move |edge, scheduler| {
            if edge == Edge::Rising {
                toggle(scheduler, &command);
            }
        })
    }

    pub fn toggle_on_false(&self, command: impl Into<CommandHandle>) -> &Self {
        let command = command.into();
        self.bind_edges(move |edge, scheduler| {
            if edge == Edge::Falling {
                toggle(scheduler, &command);
            }
        })
    }

    /// Schedules `then` on the first poll after `watched` stops being scheduled,
    /// whether it finished or was interrupted. Independent of the condition.
    pub fn on_complete(&self, watched: impl Into<CommandHandle>, then: impl Into<CommandHandle>) -> &Self {
        let (watched, then) = (watched.into(), then.into());
        let mut detector = EdgeDetector::new(false);
        self.event_loop.bind(move |scheduler| {
            if detector.update(scheduler.is_scheduled(&watched)) == Edge::Falling {
                scheduler.schedule(&then);
            }
        });
        self
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("event_loop", &self.event_loop)
            .finish_non_exhaustive()
    }
}
