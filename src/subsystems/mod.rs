pub mod intake;

pub use intake::{Intake, IntakeState};

use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fault reported by a subsystem's `periodic` hook. Aborts the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FaultType {
    #[error("subsystem degraded")]
    Degraded,
    #[error("subsystem failed")]
    Failed,
    #[error("subsystem offline")]
    Offline,
}

/// A hardware-backed resource that commands reserve exclusively.
pub trait Subsystem {
    /// Runs once per tick, before any command executes.
    fn periodic(&mut self) -> Result<(), FaultType> {
        Ok(())
    }

    fn name(&self) -> &str {
        "subsystem"
    }
}

/// A [`Subsystem`] shared between the scheduler and the commands driving it.
pub type SubsystemRef = Rc<RefCell<dyn Subsystem>>;

/// Identity of a subsystem: the address of its shared allocation.
///
/// Two ids are equal exactly when they were taken from clones of the same
/// `Rc`. An id stays meaningful for as long as that allocation is alive; the
/// scheduler keeps every registered subsystem alive, and commands normally
/// hold the subsystems they require.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubsystemId(usize);

impl SubsystemId {
    pub fn of<S: ?Sized>(subsystem: &Rc<RefCell<S>>) -> Self {
        Self(Rc::as_ptr(subsystem).cast::<()>() as usize)
    }
}

impl fmt::Debug for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubsystemId({:#x})", self.0)
    }
}

impl<S: ?Sized> From<&Rc<RefCell<S>>> for SubsystemId {
    fn from(subsystem: &Rc<RefCell<S>>) -> Self {
        Self::of(subsystem)
    }
}
