mod args;
mod command;

use std::process::ExitCode;

use altimeter_monitor::{
    altimeter::{AltitudeService, ReplayAltimeter, SimulatedAltimeter},
    manager::AltimeterManager,
    reading::Reading,
    view::Panel,
};
use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use env_logger::Env;
use tokio::{
    io::{AsyncBufReadExt as _, BufReader, stdin},
    signal,
    time::Duration,
};

use crate::command::Command;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let interval = Duration::from_millis(args.interval_ms);

    match &args.file {
        Some(path) => {
            let service = ReplayAltimeter::from_path(path, interval)
                .context("failed to create replay altimeter")?
                .with_looping(args.loop_replay)
                .with_authorization(args.authorization);
            monitor(service, args.start).await
        }
        None => {
            let service = SimulatedAltimeter::new(interval)
                .context("failed to create simulated altimeter")?
                .with_relative_available(!args.no_relative)
                .with_absolute_available(!args.no_absolute)
                .with_base_altitude(args.base_altitude)
                .with_authorization(args.authorization);
            monitor(service, args.start).await
        }
    }
}

async fn monitor<S: AltitudeService>(service: S, start: bool) -> Result<()> {
    let mut manager = AltimeterManager::new(service);
    let mut readings = manager.subscribe();

    if start {
        manager.set_running(true);
    }

    let mut lines = BufReader::new(stdin()).lines();
    let mut stdin_open = true;

    let interrupted = signal::ctrl_c();
    tokio::pin!(interrupted);

    let reading = readings.borrow_and_update().clone();
    print_panel(&reading);

    loop {
        tokio::select! {
            changed = readings.changed() => {
                changed.context("reading channel closed")?;
                let reading = readings.borrow_and_update().clone();
                print_panel(&reading);
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("failed to read command from stdin")? else {
                    // Keep monitoring until interrupted.
                    stdin_open = false;
                    continue;
                };

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line.parse::<Command>() {
                    Ok(Command::On) => manager.set_running(true),
                    Ok(Command::Off) => manager.set_running(false),
                    Ok(Command::Toggle) => {
                        manager.toggle();
                    }
                    Ok(Command::Refresh) => manager.refresh(),
                    Ok(Command::Quit) => break,
                    Err(err) => eprintln!("{err:#}"),
                }
            }
            result = &mut interrupted => {
                result.context("failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    if manager.is_running() {
        manager.set_running(false);
    }

    Ok(())
}

fn print_panel(reading: &Reading) {
    println!();
    println!("{}", Panel(reading));
}
