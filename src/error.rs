use thiserror::Error;

/// Error delivered by a sensor stream in place of a data record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("{0}")]
    Delivery(String),
}

impl SensorError {
    pub fn delivery(message: impl Into<String>) -> Self {
        SensorError::Delivery(message.into())
    }
}
