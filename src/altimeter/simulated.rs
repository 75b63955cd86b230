use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use log::debug;
use tokio::{runtime::Handle, time::interval};

use crate::altimeter::{
    AbsoluteAltitudeData, AltitudeService, AuthorizationStatus, RelativeAltitudeData,
    UpdateHandler, stream_task::StreamTask,
};

// International Standard Atmosphere, sea level.
const SEA_LEVEL_PRESSURE_KPA: f64 = 101.325;

const DEFAULT_BASE_ALTITUDE_M: f64 = 35.0;

const SIMULATED_PRECISION_M: f64 = 0.5;

const SIMULATED_ACCURACY_M: f64 = 4.0;

/// Synthetic altimeter for running without sensor hardware.
///
/// Each started stream ticks on the tokio runtime the altimeter was created
/// on and reports a slow drift around `base_altitude_m`.
#[derive(Debug)]
pub struct SimulatedAltimeter {
    runtime: Handle,
    interval: Duration,
    base_altitude_m: f64,
    relative_available: bool,
    absolute_available: bool,
    authorization: AuthorizationStatus,
    relative: StreamTask,
    absolute: StreamTask,
}

impl SimulatedAltimeter {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            bail!("simulated altimeter interval must be non-zero");
        }

        let runtime =
            Handle::try_current().context("simulated altimeter requires a tokio runtime")?;

        Ok(Self {
            runtime,
            interval,
            base_altitude_m: DEFAULT_BASE_ALTITUDE_M,
            relative_available: true,
            absolute_available: true,
            authorization: AuthorizationStatus::Authorized,
            relative: StreamTask::default(),
            absolute: StreamTask::default(),
        })
    }

    pub fn with_relative_available(mut self, available: bool) -> Self {
        self.relative_available = available;
        self
    }

    pub fn with_absolute_available(mut self, available: bool) -> Self {
        self.absolute_available = available;
        self
    }

    pub fn with_authorization(mut self, authorization: AuthorizationStatus) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn with_base_altitude(mut self, altitude_m: f64) -> Self {
        self.base_altitude_m = altitude_m;
        self
    }
}

impl AltitudeService for SimulatedAltimeter {
    fn is_relative_available(&self) -> bool {
        self.relative_available
    }

    fn is_absolute_available(&self) -> bool {
        self.absolute_available
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization
    }

    fn start_relative_updates(&self, mut handler: UpdateHandler<RelativeAltitudeData>) {
        let period = self.interval;
        let base_altitude_m = self.base_altitude_m;

        self.relative.replace(self.runtime.spawn(async move {
            let mut ticker = interval(period);
            let mut elapsed_secs = 0.0;
            loop {
                ticker.tick().await;
                let offset_m = drift_m(elapsed_secs);
                handler(Ok(Some(RelativeAltitudeData {
                    relative_altitude_m: offset_m,
                    pressure_kpa: pressure_at_kpa(base_altitude_m + offset_m),
                })));
                elapsed_secs += period.as_secs_f64();
            }
        }));
    }

    fn stop_relative_updates(&self) {
        if !self.relative.abort() {
            debug!("simulated relative stream was not running");
        }
    }

    fn start_absolute_updates(&self, mut handler: UpdateHandler<AbsoluteAltitudeData>) {
        let period = self.interval;
        let base_altitude_m = self.base_altitude_m;

        self.absolute.replace(self.runtime.spawn(async move {
            let mut ticker = interval(period);
            let mut elapsed_secs = 0.0;
            loop {
                ticker.tick().await;
                handler(Ok(Some(AbsoluteAltitudeData {
                    altitude_m: base_altitude_m + drift_m(elapsed_secs),
                    precision_m: SIMULATED_PRECISION_M,
                    accuracy_m: SIMULATED_ACCURACY_M,
                })));
                elapsed_secs += period.as_secs_f64();
            }
        }));
    }

    fn stop_absolute_updates(&self) {
        if !self.absolute.abort() {
            debug!("simulated absolute stream was not running");
        }
    }
}

/// Altitude offset after `t` seconds. Zero at `t = 0`.
fn drift_m(t: f64) -> f64 {
    2.0 * (t / 60.0).sin() + 0.3 * (t / 7.0).sin()
}

// Barometric formula for the troposphere.
fn pressure_at_kpa(altitude_m: f64) -> f64 {
    SEA_LEVEL_PRESSURE_KPA * (1.0 - 2.25577e-5 * altitude_m).powf(5.25588)
}
