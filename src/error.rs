// error.rs

use thiserror::Error;

const ERROR_UNKNOWN: &str = "Unknown error";

/// Errors raised by sensors, the sensor hub and the data sinks.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SensorError {
    /// A value is out of bounds or otherwise unusable.
    #[error("Invalid attribute error: {0}")]
    InvalidAttribute(String),

    /// A required value is absent.
    #[error("Missing attribute error: {0}")]
    MissingAttribute(String),

    /// Sensor is either unknown or not enabled.
    #[error("Invalid sensor: {sensor}")]
    InvalidSensor { sensor: String },

    #[error("Unable to collect data from sensor: {sensor} ({reason})")]
    SensorAccess { sensor: String, reason: String },

    /// A sensor or sink could not reach its peer.
    #[error("{sensor} - {}", connection_message(.errors))]
    SensorConnection { sensor: String, errors: Vec<String> },
}

fn connection_message(errors: &[String]) -> String {
    if errors.is_empty() {
        ERROR_UNKNOWN.to_string()
    } else {
        format!("Sensor connection errors: {}", errors.join(","))
    }
}

pub type SensorResult<T> = Result<T, SensorError>;


// EOF
