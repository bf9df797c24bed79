//! Host-runtime signals consumed by the scheduler.
//!
//! The scheduler never reads wall-clock time or competition state directly;
//! everything comes through [`HostRuntime`] so that a simulation can step time
//! by hand and a robot controller can forward its field-control flags.

use alloc::rc::Rc;
use core::cell::Cell;
use core::time::Duration;
use std::time::Instant;

/// Monotonic clock plus the competition-state flags of the host.
pub trait HostRuntime {
    /// Milliseconds since an arbitrary, fixed origin. Must never go backwards.
    fn now_ms(&self) -> u64;

    /// While asserted, `schedule` is a no-op and the teleop loop is not polled.
    fn is_disabled(&self) -> bool {
        false
    }

    /// While asserted, the teleop event loop is not polled.
    fn is_autonomous(&self) -> bool {
        false
    }
}

impl<T: HostRuntime + ?Sized> HostRuntime for Rc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn is_disabled(&self) -> bool {
        (**self).is_disabled()
    }

    fn is_autonomous(&self) -> bool {
        (**self).is_autonomous()
    }
}

/// Host backed by [`std::time::Instant`], with flags set by the driver.
#[derive(Debug)]
pub struct SystemHost {
    start: Instant,
    disabled: Cell<bool>,
    autonomous: Cell<bool>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            disabled: Cell::new(false),
            autonomous: Cell::new(false),
        }
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    pub fn set_autonomous(&self, autonomous: bool) {
        self.autonomous.set(autonomous);
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for SystemHost {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn is_disabled(&self) -> bool {
        self.disabled.get()
    }

    fn is_autonomous(&self) -> bool {
        self.autonomous.get()
    }
}

/// Host whose clock only moves when told to.
///
/// Share it with the scheduler through an `Rc` and keep a clone to step time:
///
/// ```rust
/// use std::rc::Rc;
/// use std::time::Duration;
/// use cmdsched::host::{HostRuntime, ManualHost};
///
/// let host = Rc::new(ManualHost::new());
/// let scheduler = cmdsched::Scheduler::new(Rc::clone(&host));
/// host.advance(Duration::from_millis(10));
/// assert_eq!(scheduler.now_ms(), 10);
/// ```
#[derive(Debug, Default)]
pub struct ManualHost {
    now_ms: Cell<u64>,
    disabled: Cell<bool>,
    autonomous: Cell<bool>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let step = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.set(self.now_ms.get().saturating_add(step));
    }

    /// Jumps the clock forward. Earlier values are ignored to keep it monotonic.
    pub fn set_now_ms(&self, now_ms: u64) {
        if now_ms > self.now_ms.get() {
            self.now_ms.set(now_ms);
        }
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    pub fn set_autonomous(&self, autonomous: bool) {
        self.autonomous.set(autonomous);
    }
}

impl HostRuntime for ManualHost {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn is_disabled(&self) -> bool {
        self.disabled.get()
    }

    fn is_autonomous(&self) -> bool {
        self.autonomous.get()
    }
}
