use std::{fs::File, io::Read, path::Path, sync::Arc, time::Duration};

use anyhow::{Context as _, Result, bail};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use tokio::{runtime::Handle, task::JoinHandle, time::interval};

use crate::{
    altimeter::{
        AbsoluteAltitudeData, AltitudeService, AuthorizationStatus, Delivery,
        RelativeAltitudeData, UpdateHandler, stream_task::StreamTask,
    },
    error::SensorError,
};

const STREAM_INDEX: usize = 0;
const RELATIVE_ALTITUDE_INDEX: usize = 1;
const PRESSURE_INDEX: usize = 2;
const ALTITUDE_INDEX: usize = 3;
const PRECISION_INDEX: usize = 4;
const ACCURACY_INDEX: usize = 5;
const ERROR_INDEX: usize = 6;

const COLUMN_NAMES: [&str; 7] = [
    "stream",
    "relative_altitude_m",
    "pressure_kpa",
    "altitude_m",
    "precision_m",
    "accuracy_m",
    "error",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    Relative(Delivery<RelativeAltitudeData>),
    Absolute(Delivery<AbsoluteAltitudeData>),
}

/// Parses a recorded session.
///
/// Expected header:
/// `stream,relative_altitude_m,pressure_kpa,altitude_m,precision_m,accuracy_m,error`
pub fn parse_replay<R: Read>(reader: R) -> Result<Vec<ReplayEvent>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let header = reader
        .headers()
        .context("failed to read replay header")?;
    if !header.iter().eq(COLUMN_NAMES) {
        bail!(
            "unexpected replay header: {}, expected: {}",
            header.iter().collect::<Vec<_>>().join(","),
            COLUMN_NAMES.join(",")
        );
    }

    let mut events = Vec::new();
    for (i, row) in reader.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = row.with_context(|| format!("failed to read replay line {line}"))?;
        let event =
            parse_row(&row).with_context(|| format!("failed to parse replay line {line}"))?;
        events.push(event);
    }

    Ok(events)
}

fn parse_row(row: &StringRecord) -> Result<ReplayEvent> {
    let stream = row.get(STREAM_INDEX).unwrap_or_default();
    let error = row.get(ERROR_INDEX).unwrap_or_default();

    match stream {
        "relative" => {
            if !error.is_empty() {
                return Ok(ReplayEvent::Relative(Err(SensorError::delivery(error))));
            }

            let relative_altitude_m = parse_cell(row, RELATIVE_ALTITUDE_INDEX)?;
            let pressure_kpa = parse_cell(row, PRESSURE_INDEX)?;
            let data = match (relative_altitude_m, pressure_kpa) {
                (Some(relative_altitude_m), Some(pressure_kpa)) => Some(RelativeAltitudeData {
                    relative_altitude_m,
                    pressure_kpa,
                }),
                (None, None) => None,
                _ => bail!("relative row must have both relative_altitude_m and pressure_kpa"),
            };

            Ok(ReplayEvent::Relative(Ok(data)))
        }
        "absolute" => {
            if !error.is_empty() {
                return Ok(ReplayEvent::Absolute(Err(SensorError::delivery(error))));
            }

            let altitude_m = parse_cell(row, ALTITUDE_INDEX)?;
            let precision_m = parse_cell(row, PRECISION_INDEX)?;
            let accuracy_m = parse_cell(row, ACCURACY_INDEX)?;
            let data = match (altitude_m, precision_m, accuracy_m) {
                (Some(altitude_m), Some(precision_m), Some(accuracy_m)) => {
                    Some(AbsoluteAltitudeData {
                        altitude_m,
                        precision_m,
                        accuracy_m,
                    })
                }
                (None, None, None) => None,
                _ => bail!("absolute row must have all of altitude_m, precision_m and accuracy_m"),
            };

            Ok(ReplayEvent::Absolute(Ok(data)))
        }
        _ => bail!("unknown stream: {:?}", stream),
    }
}

fn parse_cell(row: &StringRecord, index: usize) -> Result<Option<f64>> {
    let Some(cell) = row.get(index).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    let value = cell
        .parse()
        .with_context(|| format!("failed to parse {}: {}", COLUMN_NAMES[index], cell))?;

    Ok(Some(value))
}

/// Replays a recorded session as if it came from the sensor.
///
/// A stream is available when the recording contains at least one row for it.
#[derive(Debug)]
pub struct ReplayAltimeter {
    runtime: Handle,
    interval: Duration,
    looping: bool,
    authorization: AuthorizationStatus,
    relative_events: Arc<[Delivery<RelativeAltitudeData>]>,
    absolute_events: Arc<[Delivery<AbsoluteAltitudeData>]>,
    relative: StreamTask,
    absolute: StreamTask,
}

impl ReplayAltimeter {
    pub fn from_path(path: &Path, interval: Duration) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open replay file: {path:?}"))?;
        let altimeter = Self::from_reader(file, interval)
            .with_context(|| format!("failed to load replay file: {path:?}"))?;

        info!(
            "loaded replay {:?}: {} relative, {} absolute deliveries",
            path,
            altimeter.relative_events.len(),
            altimeter.absolute_events.len()
        );

        Ok(altimeter)
    }

    pub fn from_reader<R: Read>(reader: R, interval: Duration) -> Result<Self> {
        let events = parse_replay(reader)?;
        Self::from_events(events, interval)
    }

    pub fn from_events(events: Vec<ReplayEvent>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            bail!("replay interval must be non-zero");
        }

        let runtime = Handle::try_current().context("replay altimeter requires a tokio runtime")?;

        let mut relative_events = Vec::new();
        let mut absolute_events = Vec::new();
        for event in events {
            match event {
                ReplayEvent::Relative(delivery) => relative_events.push(delivery),
                ReplayEvent::Absolute(delivery) => absolute_events.push(delivery),
            }
        }

        Ok(Self {
            runtime,
            interval,
            looping: false,
            authorization: AuthorizationStatus::Authorized,
            relative_events: relative_events.into(),
            absolute_events: absolute_events.into(),
            relative: StreamTask::default(),
            absolute: StreamTask::default(),
        })
    }

    /// Restart from the first row after the last one has been delivered.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_authorization(mut self, authorization: AuthorizationStatus) -> Self {
        self.authorization = authorization;
        self
    }

    fn spawn<T>(
        &self,
        events: Arc<[Delivery<T>]>,
        mut handler: UpdateHandler<T>,
    ) -> JoinHandle<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let period = self.interval;
        let looping = self.looping;

        self.runtime.spawn(async move {
            if events.is_empty() {
                return;
            }

            let mut ticker = interval(period);
            loop {
                for delivery in events.iter() {
                    ticker.tick().await;
                    handler(delivery.clone());
                }

                if !looping {
                    debug!("replay finished after {} deliveries", events.len());
                    return;
                }
            }
        })
    }
}

impl AltitudeService for ReplayAltimeter {
    fn is_relative_available(&self) -> bool {
        !self.relative_events.is_empty()
    }

    fn is_absolute_available(&self) -> bool {
        !self.absolute_events.is_empty()
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization
    }

    fn start_relative_updates(&self, handler: UpdateHandler<RelativeAltitudeData>) {
        self.relative
            .replace(self.spawn(self.relative_events.clone(), handler));
    }

    fn stop_relative_updates(&self) {
        self.relative.abort();
    }

    fn start_absolute_updates(&self, handler: UpdateHandler<AbsoluteAltitudeData>) {
        self.absolute
            .replace(self.spawn(self.absolute_events.clone(), handler));
    }

    fn stop_absolute_updates(&self) {
        self.absolute.abort();
    }
}
