//! Leaf commands assembled from closures.

use super::{CancelBehavior, Command};
use crate::scheduler::Scheduler;
use crate::subsystems::SubsystemId;
use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use tracing::info;

/// A command whose four lifecycle steps are user closures.
pub struct FunctionalCommand {
    name: Cow<'static, str>,
    on_init: Box<dyn FnMut()>,
    on_execute: Box<dyn FnMut()>,
    on_end: Box<dyn FnMut(bool)>,
    is_finish: Box<dyn FnMut() -> bool>,
    requirements: Vec<SubsystemId>,
    cancel_behavior: CancelBehavior,
}

impl FunctionalCommand {
    pub fn new(
        on_init: impl FnMut() + 'static,
        on_execute: impl FnMut() + 'static,
        on_end: impl FnMut(bool) + 'static,
        is_finish: impl FnMut() -> bool + 'static,
        requirements: impl IntoIterator<Item = SubsystemId>,
    ) -> Self {
        let mut unique = Vec::new();
        for requirement in requirements {
            if !unique.contains(&requirement) {
                unique.push(requirement);
            }
        }

        Self {
            name: Cow::Borrowed("FunctionalCommand"),
            on_init: Box::new(on_init),
            on_execute: Box::new(on_execute),
            on_end: Box::new(on_end),
            is_finish: Box::new(is_finish),
            requirements: unique,
            cancel_behavior: CancelBehavior::CancelRunning,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_cancel_behavior(mut self, cancel_behavior: CancelBehavior) -> Self {
        self.cancel_behavior = cancel_behavior;
        self
    }
}

impl Command for FunctionalCommand {
    fn initialize(&mut self, _scheduler: &Scheduler) {
        (self.on_init)();
    }

    fn execute(&mut self, _scheduler: &Scheduler) {
        (self.on_execute)();
    }

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        (self.is_finish)()
    }

    fn end(&mut self, interrupted: bool, _scheduler: &Scheduler) {
        (self.on_end)(interrupted);
    }

    fn requirements(&self) -> Vec<SubsystemId> {
        self.requirements.clone()
    }

    fn cancel_behavior(&self) -> CancelBehavior {
        self.cancel_behavior
    }

    fn name(&self) -> &str {
        &self.name
    }
}

macro_rules! functional_wrapper {
    ($wrapper:ident) => {
        impl $wrapper {
            #[must_use]
            pub fn named(self, name: impl Into<Cow<'static, str>>) -> Self {
                Self(self.0.named(name))
            }

            #[must_use]
            pub fn with_cancel_behavior(self, cancel_behavior: CancelBehavior) -> Self {
                Self(self.0.with_cancel_behavior(cancel_behavior))
            }
        }

        impl Command for $wrapper {
            fn initialize(&mut self, scheduler: &Scheduler) {
                self.0.initialize(scheduler);
            }

            fn execute(&mut self, scheduler: &Scheduler) {
                self.0.execute(scheduler);
            }

            fn is_finished(&mut self, scheduler: &Scheduler) -> bool {
                self.0.is_finished(scheduler)
            }

            fn end(&mut self, interrupted: bool, scheduler: &Scheduler) {
                self.0.end(interrupted, scheduler);
            }

            fn requirements(&self) -> Vec<SubsystemId> {
                self.0.requirements()
            }

            fn cancel_behavior(&self) -> CancelBehavior {
                self.0.cancel_behavior()
            }

            fn name(&self) -> &str {
                self.0.name()
            }
        }
    };
}

/// Runs `on_init` and finishes after its first `execute`.
pub struct InstantCommand(FunctionalCommand);

impl InstantCommand {
    pub fn new(
        on_init: impl FnMut() + 'static,
        requirements: impl IntoIterator<Item = SubsystemId>,
    ) -> Self {
        Self(FunctionalCommand::new(on_init, || {}, |_| {}, || true, requirements).named("InstantCommand"))
    }
}

functional_wrapper!(InstantCommand);

/// Runs `on_execute` every tick until interrupted.
pub struct RunCommand(FunctionalCommand);

impl RunCommand {
    pub fn new(
        on_execute: impl FnMut() + 'static,
        requirements: impl IntoIterator<Item = SubsystemId>,
    ) -> Self {
        Self(FunctionalCommand::new(|| {}, on_execute, |_| {}, || false, requirements).named("RunCommand"))
    }
}

functional_wrapper!(RunCommand);

/// Finishes on the first tick `condition` holds. No requirements.
pub struct WaitUntilCommand(FunctionalCommand);

impl WaitUntilCommand {
    pub fn new(condition: impl FnMut() -> bool + 'static) -> Self {
        Self(FunctionalCommand::new(|| {}, || {}, |_| {}, condition, []).named("WaitUntilCommand"))
    }
}

functional_wrapper!(WaitUntilCommand);

/// Instant command that emits its message as an `info` event when initialized.
#[derive(Debug, Clone)]
pub struct LogCommand {
    message: String,
}

impl LogCommand {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Command for LogCommand {
    fn initialize(&mut self, scheduler: &Scheduler) {
        info!(target: "cmdsched::log", now_ms = scheduler.now_ms(), "{}", self.message);
    }

    fn is_finished(&mut self, _scheduler: &Scheduler) -> bool {
        true
    }

    fn name(&self) -> &str {
        "LogCommand"
    }
}
