//! # Cooperative Command Scheduler
//!
//! A single-threaded scheduler for robot control code. Subsystems are the
//! mechanisms; commands are the behaviors that run against them. Every tick
//! the scheduler runs subsystem periodics, polls trigger bindings, advances
//! active commands and fills idle subsystems with their default commands.
//!
//! ## Features
//!
//! - **Exclusive reservations**: a subsystem is driven by at most one command at a time
//! - **Interruptible/non-interruptible conflict policy** per command
//! - **Composition**: sequences, parallel groups, races, timeouts, repeats, proxies
//! - **Triggers**: edge-driven bindings polled once per tick
//! - **Deterministic testing** through a manually stepped host clock
//! - **Periodic driver** on tokio with overrun reporting
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//! use cmdsched::command::CommandHandle;
//! use cmdsched::host::ManualHost;
//! use cmdsched::subsystems::Intake;
//! use cmdsched::{CommandExt, Scheduler};
//!
//! let host = Rc::new(ManualHost::new());
//! let scheduler = Scheduler::new(Rc::clone(&host));
//!
//! let intake = Rc::new(RefCell::new(Intake::new()));
//! scheduler
//!     .register_subsystem(&intake, Intake::pct_command(&intake, 0.0))
//!     .unwrap();
//!
//! let eject: CommandHandle = Intake::pct_command(&intake, -1.0)
//!     .with_timeout(Duration::from_millis(50))
//!     .into();
//! scheduler.schedule(&eject);
//!
//! for _ in 0..10 {
//!     host.advance(Duration::from_millis(10));
//!     scheduler.tick().unwrap();
//! }
//! assert!(!scheduler.is_scheduled(&eject));
//! ```
//!
//! ## Architecture
//!
//! - [`scheduler`] - Reservation bookkeeping and the tick algorithm
//! - [`command`] - The command trait and the composition algebra
//! - [`trigger`] / [`event_loop`] - Condition bindings polled each tick
//! - [`subsystems`] - Subsystem trait and the simulated intake
//! - [`host`] - Clock and robot mode flags
//! - [`driver`] - Fixed-period tokio driver and its JSON config

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod command;
pub mod driver;
pub mod event_loop;
pub mod host;
pub mod scheduler;
pub mod subsystems;
pub mod trigger;

// Re-export main public types for convenience
pub use command::{CancelBehavior, Command, CommandExt, CommandHandle};
pub use event_loop::EventLoop;
pub use scheduler::{Scheduler, SchedulerError, SchedulerStats};
pub use subsystems::{Subsystem, SubsystemId};
pub use trigger::Trigger;
