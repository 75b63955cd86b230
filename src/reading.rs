use std::fmt;

use crate::altimeter::{AbsoluteAltitudeData, RelativeAltitudeData};

/// A numeric display field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DisplayValue {
    /// Nothing delivered yet.
    #[default]
    Placeholder,

    /// The capability behind this field is not supported.
    Unavailable,

    Value(f64),
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Placeholder => f.write_str("--"),
            DisplayValue::Unavailable => f.write_str("unavailable"),
            DisplayValue::Value(v) => write!(f, "{v:.2}"),
        }
    }
}

/// Latest values shown to the user. Each delivery overwrites fields in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub relative_altitude: DisplayValue,

    pub relative_pressure: DisplayValue,

    pub absolute_altitude: DisplayValue,

    pub precision: DisplayValue,

    pub accuracy: DisplayValue,

    pub authorization: String,

    pub error: Option<String>,

    pub relative_available: bool,

    pub absolute_available: bool,

    pub running: bool,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            relative_altitude: DisplayValue::Placeholder,
            relative_pressure: DisplayValue::Placeholder,
            absolute_altitude: DisplayValue::Placeholder,
            precision: DisplayValue::Placeholder,
            accuracy: DisplayValue::Placeholder,
            authorization: "--".to_owned(),
            error: None,
            relative_available: false,
            absolute_available: false,
            running: false,
        }
    }
}

impl Reading {
    pub fn apply_relative(&mut self, data: &RelativeAltitudeData) {
        self.relative_altitude = DisplayValue::Value(data.relative_altitude_m);
        self.relative_pressure = DisplayValue::Value(data.pressure_kpa);
    }

    pub fn apply_absolute(&mut self, data: &AbsoluteAltitudeData) {
        self.absolute_altitude = DisplayValue::Value(data.altitude_m);
        self.precision = DisplayValue::Value(data.precision_m);
        self.accuracy = DisplayValue::Value(data.accuracy_m);
    }

    pub fn mark_relative_unavailable(&mut self) {
        self.relative_altitude = DisplayValue::Unavailable;
        self.relative_pressure = DisplayValue::Unavailable;
    }

    pub fn mark_absolute_unavailable(&mut self) {
        self.absolute_altitude = DisplayValue::Unavailable;
        self.precision = DisplayValue::Unavailable;
        self.accuracy = DisplayValue::Unavailable;
    }
}
