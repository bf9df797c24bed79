use clap::{App, Arg};
use cmdsched::command::{CommandHandle, LogCommand};
use cmdsched::driver::{self, DriverConfig, DriverReport};
use cmdsched::host::{HostRuntime, ManualHost, SystemHost};
use cmdsched::subsystems::Intake;
use cmdsched::{sequence, CommandExt, Scheduler, Trigger};
use colored::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, Level};

const DEFAULT_TICKS: u64 = 300;
const STATUS_INTERVAL_MS: u64 = 500;

// Scripted driver station: (button, pressed from ms, released at ms)
const FEED_HELD: (u64, u64) = (200, 600);
const OUTTAKE_PRESSES: [(u64, u64); 2] = [(800, 850), (1500, 1550)];
const DEJAM_PRESS: (u64, u64) = (2000, 2050);

fn validate_number(value: String) -> Result<(), String> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(()),
        _ => Err("Value must be a positive integer".into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("cmdsched-sim")
        .version("0.1.0")
        .author("Controls Software Team")
        .about("🤖 Runs a scripted intake routine through the command scheduler")
        .arg(
            Arg::with_name("ticks")
                .short("t")
                .long("ticks")
                .value_name("TICKS")
                .help("Number of ticks to run")
                .takes_value(true)
                .validator(validate_number),
        )
        .arg(
            Arg::with_name("period-ms")
                .short("p")
                .long("period-ms")
                .value_name("MS")
                .help("Tick period in milliseconds")
                .takes_value(true)
                .validator(validate_number),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON driver config")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("realtime")
                .short("r")
                .long("realtime")
                .help("Tick against the wall clock instead of stepping simulated time"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = match matches.value_of("config") {
        Some(path) => DriverConfig::from_file(path)?,
        None => DriverConfig::default(),
    };
    if let Some(ticks) = matches.value_of("ticks") {
        config.max_ticks = Some(ticks.parse()?);
    }
    if let Some(period) = matches.value_of("period-ms") {
        config.period_ms = period.parse()?;
    }
    config.validate()?;

    println!("{}", "🤖 Command Scheduler Simulator".bold());
    println!("{}", "==============================".bold());

    let report = if matches.is_present("realtime") {
        run_realtime(&config).await?
    } else {
        run_stepped(&config)?
    };

    println!();
    println!("{}", "✅ Run complete".green().bold());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_stepped(config: &DriverConfig) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let host = Rc::new(ManualHost::new());
    let scheduler = build_robot(Rc::clone(&host) as Rc<dyn HostRuntime>)?;
    let ticks = config.max_ticks.unwrap_or(DEFAULT_TICKS);

    for _ in 0..ticks {
        host.advance(config.period());
        scheduler.tick()?;
    }

    let report = DriverReport {
        ticks,
        ..DriverReport::default()
    };
    Ok(serde_json::json!({ "driver": report, "scheduler": scheduler.stats() }))
}

async fn run_realtime(config: &DriverConfig) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let host = Rc::new(SystemHost::new());
    let scheduler = build_robot(host as Rc<dyn HostRuntime>)?;

    println!("{}", "⏱️  Realtime mode, Ctrl+C to stop".yellow());
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let report = driver::run_periodic(&scheduler, config, shutdown).await?;
    Ok(serde_json::json!({ "driver": report, "scheduler": scheduler.stats() }))
}

fn build_robot(host: Rc<dyn HostRuntime>) -> Result<Scheduler, Box<dyn std::error::Error>> {
    let scheduler = Scheduler::new(Rc::clone(&host));
    let intake = Rc::new(RefCell::new(Intake::new()));
    scheduler.register_subsystem(&intake, Intake::pct_command(&intake, 0.0))?;

    let held = |(from, to): (u64, u64)| {
        let clock = Rc::clone(&host);
        move || (from..to).contains(&clock.now_ms())
    };

    let feed = Intake::pct_command(&intake, 1.0).named("Feed");
    Trigger::teleop(&scheduler, held(FEED_HELD)).while_true(feed);

    let outtake: CommandHandle = Intake::pct_command(&intake, -0.5).named("Outtake").into();
    for press in OUTTAKE_PRESSES {
        Trigger::teleop(&scheduler, held(press)).toggle_on_true(outtake.clone());
    }

    let step = Duration::from_millis(100);
    let dejam: CommandHandle = sequence!(
        LogCommand::new("dejam cycle"),
        Intake::pct_command(&intake, -1.0).with_timeout(step),
        Intake::pct_command(&intake, 1.0).with_timeout(step),
    )
    .repeatedly()
    .with_timeout(Duration::from_millis(600))
    .into();
    Trigger::teleop(&scheduler, held(DEJAM_PRESS))
        .on_true(dejam.clone())
        .on_complete(dejam, LogCommand::new("dejam finished"));

    let status_intake = Rc::clone(&intake);
    let mut next_status_ms = 0;
    scheduler.default_event_loop().bind(move |scheduler| {
        let now_ms = scheduler.now_ms();
        if now_ms < next_status_ms {
            return;
        }
        next_status_ms = now_ms + STATUS_INTERVAL_MS;
        let state = status_intake.borrow().get_state();
        let active: Vec<String> = scheduler.active_commands().iter().map(CommandHandle::name).collect();
        info!(
            now_ms,
            pct = state.commanded_pct,
            velocity_rpm = state.velocity_rpm,
            active = ?active,
            "📊 status"
        );
    });

    Ok(scheduler)
}
