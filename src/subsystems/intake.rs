use super::{FaultType, Subsystem, SubsystemId};
use crate::command::RunCommand;
use alloc::rc::Rc;
use core::cell::RefCell;
use serde::{Deserialize, Serialize};

const BUS_VOLTAGE_MV: f64 = 12000.0;
const FREE_SPEED_RPM: f64 = 600.0;
// Fraction of the velocity error closed per tick
const NOMINAL_RESPONSE: f64 = 0.2;
const DEGRADED_RESPONSE: f64 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntakeState {
    pub commanded_pct: f64,
    pub voltage_mv: i32,
    pub velocity_rpm: f64,
    pub periodic_count: u64,
}

/// Simulated single-motor roller intake driven by percent voltage.
#[derive(Debug)]
pub struct Intake {
    state: IntakeState,
    fault_state: Option<FaultType>,
}

impl Intake {
    pub fn new() -> Self {
        Self {
            state: IntakeState {
                commanded_pct: 0.0,
                voltage_mv: 0,
                velocity_rpm: 0.0,
                periodic_count: 0,
            },
            fault_state: None,
        }
    }

    /// Sets the motor output as a signed fraction of bus voltage, clamped to [-1, 1].
    pub fn set_pct(&mut self, pct: f64) {
        let pct = if pct.is_nan() { 0.0 } else { pct.clamp(-1.0, 1.0) };
        self.state.commanded_pct = pct;
        self.state.voltage_mv = (pct * BUS_VOLTAGE_MV) as i32;
    }

    pub fn get_state(&self) -> IntakeState {
        self.state.clone()
    }

    pub fn inject_fault(&mut self, fault: FaultType) {
        self.fault_state = Some(fault);
    }

    pub fn clear_faults(&mut self) {
        self.fault_state = None;
    }

    pub fn is_healthy(&self) -> bool {
        self.fault_state.is_none()
    }

    /// A never-ending command that holds the intake at `pct` every tick.
    ///
    /// Typical use is as the default command (`pct = 0.0`) or bound to a button.
    pub fn pct_command(intake: &Rc<RefCell<Intake>>, pct: f64) -> RunCommand {
        let target = Rc::clone(intake);
        RunCommand::new(
            move || target.borrow_mut().set_pct(pct),
            [SubsystemId::of(intake)],
        )
        .named(if pct == 0.0 { "IntakeStop" } else { "IntakePct" })
    }
}

impl Default for Intake {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystem for Intake {
    fn periodic(&mut self) -> Result<(), FaultType> {
        let response = match self.fault_state {
            Some(fault @ (FaultType::Failed | FaultType::Offline)) => return Err(fault),
            // Keeps running with a sluggish motor
            Some(FaultType::Degraded) => DEGRADED_RESPONSE,
            None => NOMINAL_RESPONSE,
        };

        let target_rpm = self.state.commanded_pct * FREE_SPEED_RPM;
        self.state.velocity_rpm += (target_rpm - self.state.velocity_rpm) * response;
        self.state.periodic_count += 1;

        debug_assert!(
            self.state.velocity_rpm.abs() <= FREE_SPEED_RPM + f64::EPSILON,
            "Intake velocity {} exceeds free speed {}",
            self.state.velocity_rpm,
            FREE_SPEED_RPM
        );

        Ok(())
    }

    fn name(&self) -> &str {
        "intake"
    }
}
