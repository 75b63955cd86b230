#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeAltitudeData {
    /// Change in altitude since the stream was started.
    pub relative_altitude_m: f64,

    pub pressure_kpa: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteAltitudeData {
    /// Altitude above sea level.
    pub altitude_m: f64,

    pub precision_m: f64,

    pub accuracy_m: f64,
}
