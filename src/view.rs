use std::fmt;

use crate::reading::Reading;

/// Text panel for a [`Reading`].
pub struct Panel<'a>(pub &'a Reading);

impl fmt::Display for Panel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reading = self.0;

        writeln!(f, "Altitude: {} m", reading.relative_altitude)?;
        writeln!(f, "Pressure: {} kPa", reading.relative_pressure)?;
        writeln!(f, "Altitude (absolute): {} m", reading.absolute_altitude)?;
        writeln!(f, "Precision: {} m", reading.precision)?;
        writeln!(f, "Accuracy: {} m", reading.accuracy)?;
        writeln!(f, "Auth status: {}", reading.authorization)?;

        if let Some(error) = &reading.error {
            writeln!(f, "Error: {error}")?;
        }

        writeln!(
            f,
            "Altimeter | Barometer Sensor: {}",
            if reading.running { "On" } else { "Off" }
        )?;
        writeln!(f, "Relative available: {}", yes_no(reading.relative_available))?;
        write!(f, "Absolute available: {}", yes_no(reading.absolute_available))
    }
}

pub fn render(reading: &Reading) -> String {
    Panel(reading).to_string()
}

fn yes_no(v: bool) -> &'static str {
    if v { "Yes" } else { "No" }
}
