// response.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::*;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// Outcome of a single collect call on one sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub sensor: String,
    pub data: serde_json::Value,
    pub errors: Option<Vec<String>>,
}

impl Response {
    pub fn new(sensor: &str, data: serde_json::Value, errors: Option<Vec<String>>) -> Self {
        let errors = errors.filter(|e| !e.is_empty());
        Response {
            status: if errors.is_some() {
                Status::Failure
            } else {
                Status::Success
            },
            sensor: sensor.into(),
            data,
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_none()
    }

    pub fn raise_on_errors(&self) -> SensorResult<()> {
        match &self.errors {
            Some(errors) => Err(SensorError::SensorConnection {
                sensor: self.sensor.clone(),
                errors: errors.clone(),
            }),
            None => Ok(()),
        }
    }

    /// The measurement carried in `data`, if this was a successful read.
    pub fn measurement(&self) -> Option<Measurement> {
        if !self.is_ok() {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Response,sensor={},status={}, errors={:?}>",
            capitalize(&self.sensor),
            self.status,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status() {
        let ok = Response::new("chameleon", json!({"value": 1}), None);
        assert_eq!(ok.status, Status::Success);
        assert!(ok.is_ok());
        assert!(ok.raise_on_errors().is_ok());

        // empty error list counts as no errors
        let ok = Response::new("chameleon", json!(null), Some(vec![]));
        assert!(ok.is_ok());

        let bad = Response::new("chameleon", json!(null), Some(vec!["boom".into()]));
        assert_eq!(bad.status, Status::Failure);
        assert!(!bad.is_ok());
        assert_eq!(
            bad.raise_on_errors(),
            Err(SensorError::SensorConnection {
                sensor: "chameleon".into(),
                errors: vec!["boom".into()],
            })
        );
    }

    #[test]
    fn test_display() {
        let r = Response::new("chameleon", json!(null), None);
        assert_eq!(r.to_string(), "<Response,sensor=Chameleon,status=success, errors=None>");
    }

    #[test]
    fn test_measurement() {
        let m = Measurement::new("chameleon", SensorKind::Rain, 12.0, "mm");
        let r = Response::new("chameleon", serde_json::to_value(&m).unwrap(), None);
        assert_eq!(r.measurement(), Some(m));

        let r = Response::new("chameleon", json!({"value": 3}), Some(vec!["x".into()]));
        assert_eq!(r.measurement(), None);
    }
}

// EOF
