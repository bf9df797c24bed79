#![allow(dead_code)]

use cmdsched::command::CommandHandle;
use cmdsched::host::ManualHost;
use cmdsched::subsystems::FaultType;
use cmdsched::{CancelBehavior, Command, Scheduler, Subsystem, SubsystemId};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub const PERIOD: Duration = Duration::from_millis(10);

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

/// Scheduler over a manual clock starting at zero.
pub fn harness() -> (Rc<ManualHost>, Scheduler) {
    let host = Rc::new(ManualHost::new());
    let scheduler = Scheduler::new(Rc::clone(&host));
    (host, scheduler)
}

/// Advances the clock one period, ticks, and checks the reservation invariants.
pub fn step(host: &ManualHost, scheduler: &Scheduler) {
    host.advance(PERIOD);
    scheduler.tick().expect("tick failed");
    scheduler
        .check_invariants()
        .unwrap_or_else(|violation| panic!("invariant broken: {violation}"));
}

/// Subsystem that only counts its periodic calls.
#[derive(Debug)]
pub struct FakeSubsystem {
    pub name: &'static str,
    pub periodic_calls: u32,
    pub fault: Option<FaultType>,
}

impl FakeSubsystem {
    pub fn shared(name: &'static str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            name,
            periodic_calls: 0,
            fault: None,
        }))
    }
}

impl Subsystem for FakeSubsystem {
    fn periodic(&mut self) -> Result<(), FaultType> {
        self.periodic_calls += 1;
        self.fault.map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Command that records every lifecycle call as `"<name>.<call>"`.
pub struct Probe {
    name: &'static str,
    log: Log,
    requirements: Vec<SubsystemId>,
    cancel_behavior: CancelBehavior,
    finish_after: Option<u32>,
    executed: u32,
}

impl Probe {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            requirements: Vec::new(),
            cancel_behavior: CancelBehavior::CancelRunning,
            finish_after: None,
            executed: 0,
        }
    }

    pub fn requiring(mut self, subsystem: impl Into<SubsystemId>) -> Self {
        self.requirements.push(subsystem.into());
        self
    }

    pub fn non_interruptible(mut self) -> Self {
        self.cancel_behavior = CancelBehavior::CancelIncoming;
        self
    }

    /// Reports finished once it has executed `executions` times.
    pub fn finishing_after(mut self, executions: u32) -> Self {
        self.finish_after = Some(executions);
        self
    }

    pub fn handle(self) -> CommandHandle {
        self.into()
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().push(format!("{}.{}", self.name, call));
    }
}

impl Command for Probe {
    fn initialize(&mut self, _scheduler: &Scheduler) {
        self.executed = 0;
        self.record("init");
    }

    fn execute(&mut self, _scheduler: &Scheduler) {
        self.executed += 1;
        self.record("exec");
    }

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        self.finish_after.is_some_and(|limit| self.executed >= limit)
    }

    fn end(&mut self, interrupted: bool, _scheduler: &Scheduler) {
        self.record(&format!("end({interrupted})"));
    }

    fn requirements(&self) -> Vec<SubsystemId> {
        self.requirements.clone()
    }

    fn cancel_behavior(&self) -> CancelBehavior {
        self.cancel_behavior
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Delegates to `inner` and records each `end` it receives as `"<name>.end(<interrupted>)"`.
pub struct Observed {
    name: &'static str,
    log: Log,
    inner: CommandHandle,
}

impl Observed {
    pub fn new(name: &'static str, log: &Log, inner: impl Into<CommandHandle>) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            inner: inner.into(),
        }
    }
}

impl Command for Observed {
    fn initialize(&mut self, scheduler: &Scheduler) {
        self.inner.initialize(scheduler);
    }

    fn execute(&mut self, scheduler: &Scheduler) {
        self.inner.execute(scheduler);
    }

    fn is_finished(&mut self, scheduler: &Scheduler) -> bool {
        self.inner.is_finished(scheduler)
    }

    fn end(&mut self, interrupted: bool, scheduler: &Scheduler) {
        self.log
            .borrow_mut()
            .push(format!("{}.end({interrupted})", self.name));
        self.inner.end(interrupted, scheduler);
    }

    fn requirements(&self) -> Vec<SubsystemId> {
        self.inner.requirements()
    }

    fn cancel_behavior(&self) -> CancelBehavior {
        self.inner.cancel_behavior()
    }

    fn name(&self) -> &str {
        self.name
    }
}
