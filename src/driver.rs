//! Fixed-cadence driver that ticks a [`Scheduler`] from a tokio task.
//!
//! The scheduler is `!Send`, so the driver future must run on the thread
//! that owns it: a current-thread runtime or a `LocalSet`.

use crate::scheduler::{Scheduler, SchedulerError};
use core::future::Future;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

pub const DEFAULT_PERIOD_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("period_ms must be greater than zero")]
    ZeroPeriod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Nominal time between tick starts.
    pub period_ms: u64,
    /// Stop after this many ticks; run until shutdown when absent.
    pub max_ticks: Option<u64>,
    /// A tick taking longer than this is logged as an overrun.
    pub overrun_warn_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            max_ticks: None,
            overrun_warn_ms: DEFAULT_PERIOD_MS,
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReport {
    pub ticks: u64,
    pub overruns: u64,
    pub max_tick_us: u64,
}

/// Ticks `scheduler` every `config.period_ms` until `shutdown` resolves or
/// `config.max_ticks` is reached.
///
/// Missed deadlines are caught up back to back, so the long-run rate stays
/// at the nominal period instead of drifting. A subsystem fault stops the
/// driver and is returned.
pub async fn run_periodic(
    scheduler: &Scheduler,
    config: &DriverConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<DriverReport, SchedulerError> {
    let mut interval = time::interval(config.period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let overrun_threshold = Duration::from_millis(config.overrun_warn_ms);

    tokio::pin!(shutdown);
    let mut report = DriverReport::default();

    loop {
        if config.max_ticks.is_some_and(|max| report.ticks >= max) {
            break;
        }

        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!(ticks = report.ticks, "shutdown requested");
                break;
            }
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        scheduler.tick()?;
        let elapsed = started.elapsed();

        report.ticks += 1;
        report.max_tick_us = report
            .max_tick_us
            .max(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
        if elapsed > overrun_threshold {
            report.overruns += 1;
            warn!(
                tick = report.ticks,
                elapsed_us = elapsed.as_micros() as u64,
                "tick overran its budget"
            );
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;
    use crate::subsystems::{FaultType, Intake};
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.period_ms, 10);
        assert_eq!(config.max_ticks, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DriverConfig::from_json_str(r#"{ "max_ticks": 50 }"#).unwrap();
        assert_eq!(config.period_ms, DEFAULT_PERIOD_MS);
        assert_eq!(config.max_ticks, Some(50));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(matches!(
            DriverConfig::from_json_str(r#"{ "period_ms": 0 }"#),
            Err(ConfigError::ZeroPeriod)
        ));
        assert!(matches!(
            DriverConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            DriverConfig::from_file("/nonexistent/cmdsched.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_max_ticks() {
        let scheduler = Scheduler::new(ManualHost::new());
        let config = DriverConfig {
            max_ticks: Some(5),
            ..DriverConfig::default()
        };

        let report = run_periodic(&scheduler, &config, core::future::pending())
            .await
            .unwrap();
        assert_eq!(report.ticks, 5);
        assert_eq!(report.overruns, 0);
        assert_eq!(scheduler.stats().ticks, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_run() {
        let scheduler = Scheduler::new(ManualHost::new());
        let config = DriverConfig::default();

        // Ticks land at 0, 10, 20 and 30 ms before the 35 ms shutdown
        let report = run_periodic(&scheduler, &config, time::sleep(Duration::from_millis(35)))
            .await
            .unwrap();
        assert_eq!(report.ticks, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_stops_driver() {
        let scheduler = Scheduler::new(ManualHost::new());
        let intake = Rc::new(RefCell::new(Intake::new()));
        scheduler
            .register_subsystem(&intake, Intake::pct_command(&intake, 0.0))
            .unwrap();
        intake.borrow_mut().inject_fault(FaultType::Failed);

        let config = DriverConfig {
            max_ticks: Some(10),
            ..DriverConfig::default()
        };
        let result = run_periodic(&scheduler, &config, core::future::pending()).await;
        assert!(matches!(result, Err(SchedulerError::SubsystemFault { .. })));
        assert_eq!(scheduler.stats().ticks, 1);
    }
}
