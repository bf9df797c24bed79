mod common;

use cmdsched::command::CommandHandle;
use cmdsched::subsystems::FaultType;
use cmdsched::{sequence, Command, CommandExt, Scheduler, SchedulerError};
use common::{harness, new_log, step, take, FakeSubsystem, Probe};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_default_command_fills_idle_subsystem() {
    let (host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    let idle = Probe::new("R", &log).requiring(&feeder).handle();
    scheduler.register_subsystem(&feeder, idle.clone()).unwrap();

    // Nothing runs before the first sweep
    assert!(!scheduler.is_scheduled(&idle));

    step(&host, &scheduler);
    assert_eq!(take(&log), ["R.init"]);
    assert!(scheduler.is_scheduled(&idle));
    assert!(scheduler.requiring(&feeder).is_some_and(|owner| owner.ptr_eq(&idle)));
    assert_eq!(scheduler.active_commands().len(), 1);

    step(&host, &scheduler);
    assert_eq!(take(&log), ["R.exec"]);
    assert_eq!(feeder.borrow().periodic_calls, 2);
}

#[test]
fn test_default_resumes_after_command_finishes() {
    let (host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    let idle = Probe::new("D", &log).requiring(&feeder).handle();
    scheduler.register_subsystem(&feeder, idle.clone()).unwrap();
    step(&host, &scheduler);

    let shot = Probe::new("A", &log).requiring(&feeder).finishing_after(1).handle();
    scheduler.schedule(&shot);
    step(&host, &scheduler);

    // Freed and refilled within the same tick
    assert_eq!(
        take(&log),
        ["D.init", "D.end(true)", "A.init", "A.exec", "A.end(false)", "D.init"]
    );
    assert!(scheduler.requiring(&feeder).is_some_and(|owner| owner.ptr_eq(&idle)));
}

#[test]
fn test_sweep_runs_in_registration_order() {
    let (host, scheduler) = harness();
    let log = new_log();
    let (first, second) = (FakeSubsystem::shared("first"), FakeSubsystem::shared("second"));
    scheduler
        .register_subsystem(&first, Probe::new("first", &log).requiring(&first))
        .unwrap();
    scheduler
        .register_subsystem(&second, Probe::new("second", &log).requiring(&second))
        .unwrap();

    step(&host, &scheduler);
    assert_eq!(take(&log), ["first.init", "second.init"]);
}

#[test]
fn test_duplicate_registration_rejected() {
    let (_host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    scheduler
        .register_subsystem(&feeder, Probe::new("a", &log).requiring(&feeder))
        .unwrap();

    let result = scheduler.register_subsystem(&feeder, Probe::new("b", &log).requiring(&feeder));
    assert!(matches!(result, Err(SchedulerError::DuplicateSubsystem(name)) if name == "feeder"));
}

#[test]
fn test_preemption_call_order() {
    let (host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    scheduler
        .register_subsystem(&feeder, Probe::new("D", &log).requiring(&feeder))
        .unwrap();
    step(&host, &scheduler);
    take(&log);

    let a = Probe::new("A", &log).requiring(&feeder).handle();
    let b = Probe::new("B", &log).requiring(&feeder).handle();
    scheduler.schedule(&a);
    step(&host, &scheduler);
    scheduler.schedule(&b);

    assert_eq!(take(&log), ["D.end(true)", "A.init", "A.exec", "A.end(true)", "B.init"]);
    assert!(scheduler.requiring(&feeder).is_some_and(|owner| owner.ptr_eq(&b)));
    assert!(!scheduler.is_scheduled(&a));
    assert_eq!(scheduler.stats().total_interrupted, 2);
}

#[test]
fn test_cancel_incoming_blocks_newcomer() {
    let (host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    scheduler
        .register_subsystem(&feeder, Probe::new("D", &log).requiring(&feeder))
        .unwrap();
    step(&host, &scheduler);

    let a = Probe::new("A", &log).requiring(&feeder).non_interruptible().handle();
    let b = Probe::new("B", &log).requiring(&feeder).handle();
    scheduler.schedule(&a);
    take(&log);

    scheduler.schedule(&b);
    step(&host, &scheduler);

    assert_eq!(take(&log), ["A.exec"]);
    assert!(scheduler.is_scheduled(&a));
    assert!(!scheduler.is_scheduled(&b));
    assert_eq!(scheduler.stats().total_rejected, 1);
}

#[test]
fn test_newcomer_preempts_every_conflicting_holder() {
    let (host, scheduler) = harness();
    let log = new_log();
    let (arm, wrist) = (FakeSubsystem::shared("arm"), FakeSubsystem::shared("wrist"));
    scheduler
        .register_subsystem(&arm, Probe::new("arm_idle", &log).requiring(&arm))
        .unwrap();
    scheduler
        .register_subsystem(&wrist, Probe::new("wrist_idle", &log).requiring(&wrist))
        .unwrap();
    step(&host, &scheduler);
    take(&log);

    let stow = Probe::new("stow", &log).requiring(&arm).requiring(&wrist).handle();
    scheduler.schedule(&stow);
    assert_eq!(take(&log), ["arm_idle.end(true)", "wrist_idle.end(true)", "stow.init"]);
    assert_eq!(scheduler.active_commands().len(), 1);
    scheduler.check_invariants().unwrap();
}

#[test]
fn test_preemption_skips_holder_already_cancelled() {
    let (host, scheduler) = harness();
    let log = new_log();
    let (f, g) = (FakeSubsystem::shared("f"), FakeSubsystem::shared("g"));
    let routine: CommandHandle = sequence!(
        Probe::new("g0", &log).requiring(&g).finishing_after(1),
        Probe::new("a", &log).requiring(&f).as_proxy(),
    )
    .into();
    scheduler.schedule(&routine);
    step(&host, &scheduler);

    // Ending the routine cancels its proxied child, which also holds `f`
    let both = Probe::new("b", &log).requiring(&f).requiring(&g).handle();
    scheduler.schedule(&both);

    assert_eq!(
        take(&log),
        ["g0.init", "g0.exec", "g0.end(false)", "a.init", "a.end(true)", "b.init"]
    );
    assert!(scheduler.check_invariants().is_ok());
    assert_eq!(scheduler.active_commands().len(), 1);
}

#[test]
fn test_schedule_from_initialize_sees_newcomer_reservations() {
    let (host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    let idle = Probe::new("D", &log).requiring(&feeder).handle();
    scheduler.register_subsystem(&feeder, idle.clone()).unwrap();
    step(&host, &scheduler);
    take(&log);

    let child = Probe::new("a", &log).requiring(&feeder).finishing_after(1).handle();
    let routine: CommandHandle = sequence!(
        child.clone().as_proxy(),
        Probe::new("b", &log).requiring(&feeder),
    )
    .into();
    scheduler.schedule(&routine);

    // The child's schedule lands after the routine is active and interrupts it
    assert_eq!(take(&log), ["D.end(true)", "a.init"]);
    assert!(scheduler.check_invariants().is_ok());
    assert!(!scheduler.is_scheduled(&routine));
    assert!(scheduler.requiring(&feeder).is_some_and(|owner| owner.ptr_eq(&child)));

    step(&host, &scheduler);
    assert_eq!(take(&log), ["a.exec", "a.end(false)", "D.init"]);
}

#[test]
fn test_schedule_is_idempotent() {
    let (_host, scheduler) = harness();
    let log = new_log();
    let command = Probe::new("C", &log).handle();

    scheduler.schedule(&command);
    scheduler.schedule(&command);
    assert_eq!(take(&log), ["C.init"]);
    assert_eq!(scheduler.stats().total_scheduled, 1);
}

#[test]
fn test_cancel_inactive_is_noop() {
    let (_host, scheduler) = harness();
    let log = new_log();
    let command = Probe::new("C", &log).handle();

    scheduler.cancel(&command);
    assert!(take(&log).is_empty());
    assert_eq!(scheduler.stats().total_interrupted, 0);
}

#[test]
fn test_natural_finish_ends_once_with_false() {
    let (host, scheduler) = harness();
    let log = new_log();
    let command = Probe::new("C", &log).finishing_after(2).handle();

    scheduler.schedule(&command);
    for _ in 0..4 {
        step(&host, &scheduler);
    }
    assert_eq!(take(&log), ["C.init", "C.exec", "C.exec", "C.end(false)"]);
    assert_eq!(scheduler.stats().total_finished, 1);
}

#[test]
fn test_cancel_all_interrupts_everything() {
    let (host, scheduler) = harness();
    let log = new_log();
    let (a, b) = (Probe::new("A", &log).handle(), Probe::new("B", &log).handle());
    scheduler.schedule(&a);
    scheduler.schedule(&b);
    step(&host, &scheduler);
    take(&log);

    scheduler.cancel_all();
    assert_eq!(take(&log), ["A.end(true)", "B.end(true)"]);
    assert!(scheduler.active_commands().is_empty());
}

#[test]
fn test_disabled_host_ignores_schedules() {
    let (host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    let idle = Probe::new("D", &log).requiring(&feeder).handle();
    scheduler.register_subsystem(&feeder, idle.clone()).unwrap();

    host.set_disabled(true);
    let command = Probe::new("C", &log).handle();
    scheduler.schedule(&command);
    step(&host, &scheduler);
    assert!(!scheduler.is_scheduled(&command));
    assert!(!scheduler.is_scheduled(&idle));
    assert_eq!(feeder.borrow().periodic_calls, 1);

    host.set_disabled(false);
    step(&host, &scheduler);
    assert!(scheduler.is_scheduled(&idle));
    assert_eq!(take(&log), ["D.init"]);
}

#[test]
fn test_disabling_host_leaves_running_commands_alone() {
    let (host, scheduler) = harness();
    let log = new_log();
    let command = Probe::new("C", &log).handle();
    scheduler.schedule(&command);

    host.set_disabled(true);
    step(&host, &scheduler);
    step(&host, &scheduler);

    assert_eq!(take(&log), ["C.init", "C.exec", "C.exec"]);
    assert!(scheduler.is_scheduled(&command));
}

#[test]
fn test_teleop_loop_skipped_in_autonomous() {
    let (host, scheduler) = harness();
    let (default_polls, teleop_polls) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
    let counter = default_polls.clone();
    scheduler.default_event_loop().bind(move |_| counter.set(counter.get() + 1));
    let counter = teleop_polls.clone();
    scheduler.teleop_event_loop().bind(move |_| counter.set(counter.get() + 1));

    step(&host, &scheduler);
    host.set_autonomous(true);
    step(&host, &scheduler);
    host.set_autonomous(false);
    host.set_disabled(true);
    step(&host, &scheduler);

    assert_eq!(default_polls.get(), 3);
    assert_eq!(teleop_polls.get(), 1);
}

#[test]
fn test_event_loop_schedules_take_effect_same_tick() {
    let (host, scheduler) = harness();
    let log = new_log();
    let command = Probe::new("C", &log).handle();
    let target = command.clone();
    scheduler.default_event_loop().bind(move |scheduler| scheduler.schedule(&target));

    step(&host, &scheduler);
    assert_eq!(take(&log), ["C.init", "C.exec"]);
}

struct Launcher {
    target: CommandHandle,
    fired: bool,
}

impl Command for Launcher {
    fn execute(&mut self, scheduler: &Scheduler) {
        if !self.fired {
            self.fired = true;
            scheduler.schedule(&self.target);
        }
    }
}

#[test]
fn test_schedule_from_execute_is_deferred() {
    let (host, scheduler) = harness();
    let log = new_log();
    let feeder = FakeSubsystem::shared("feeder");
    let holder = Probe::new("holder", &log).requiring(&feeder).handle();
    let successor = Probe::new("next", &log).requiring(&feeder).handle();
    scheduler.schedule(&holder);
    scheduler.schedule(&CommandHandle::new(Launcher {
        target: successor.clone(),
        fired: false,
    }));
    take(&log);

    // Applied after the pass, so the holder still executes this tick
    step(&host, &scheduler);
    assert_eq!(take(&log), ["holder.exec", "holder.end(true)", "next.init"]);
    assert!(scheduler.is_scheduled(&successor));

    step(&host, &scheduler);
    assert_eq!(take(&log), ["next.exec"]);
}

#[test]
fn test_subsystem_fault_aborts_tick() {
    let (_host, scheduler) = harness();
    let log = new_log();
    let arm = FakeSubsystem::shared("arm");
    scheduler
        .register_subsystem(&arm, Probe::new("idle", &log).requiring(&arm))
        .unwrap();
    arm.borrow_mut().fault = Some(FaultType::Offline);

    let result = scheduler.tick();
    assert!(matches!(
        result,
        Err(SchedulerError::SubsystemFault { ref name, fault: FaultType::Offline }) if name == "arm"
    ));
    // The sweep never ran
    assert!(take(&log).is_empty());
}

#[test]
fn test_stats_serialize() {
    let (host, scheduler) = harness();
    let log = new_log();
    scheduler.schedule(&Probe::new("C", &log).finishing_after(1).handle());
    step(&host, &scheduler);

    let json = serde_json::to_value(scheduler.stats()).unwrap();
    assert_eq!(json["ticks"], 1);
    assert_eq!(json["total_scheduled"], 1);
    assert_eq!(json["total_finished"], 1);
    assert_eq!(json["currently_active"], 0);
}
