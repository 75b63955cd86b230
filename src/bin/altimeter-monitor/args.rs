use std::path::PathBuf;

use altimeter_monitor::altimeter::AuthorizationStatus;
use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    /// Replay a recorded CSV session instead of the simulator.
    #[arg(long, env = "ALTIMETER_REPLAY_FILE")]
    pub file: Option<PathBuf>,

    #[arg(
        long,
        env = "ALTIMETER_INTERVAL_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_ms: u64,

    /// Altitude the simulator drifts around, in metres.
    #[arg(long, env = "ALTIMETER_BASE_ALTITUDE_M", default_value_t = 35.0)]
    pub base_altitude: f64,

    #[arg(long)]
    pub no_relative: bool,

    #[arg(long)]
    pub no_absolute: bool,

    #[arg(long, default_value = "authorized")]
    pub authorization: AuthorizationStatus,

    #[arg(long)]
    pub loop_replay: bool,

    /// Turn the sensor toggle on at startup.
    #[arg(long)]
    pub start: bool,
}
