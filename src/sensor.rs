// sensor.rs

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::*;

/// The sensor slots known to the hub.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumString,
    Deserialize,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Wind,
    Rain,
    Speed,
}

impl SensorKind {
    /// Config section holding the settings for this slot.
    pub fn section(&self) -> &'static str {
        match self {
            SensorKind::Temperature => SENSOR_TEMP,
            SensorKind::Humidity => SENSOR_HUMID,
            SensorKind::Wind => SENSOR_WIND,
            SensorKind::Rain => SENSOR_RAIN,
            SensorKind::Speed => SENSOR_SPEED,
        }
    }

    pub fn sensor_type(&self) -> &'static str {
        match self {
            SensorKind::Temperature => SNSR_TYPE_TEMP,
            SensorKind::Humidity => SNSR_TYPE_HUMID,
            SensorKind::Wind => SNSR_TYPE_WIND,
            SensorKind::Rain => SNSR_TYPE_RAIN,
            SensorKind::Speed => SNSR_TYPE_SPEED,
        }
    }

    pub fn from_section(section: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        SensorKind::iter().find(|k| k.section() == section)
    }

    /// Value range used by simulated sensors when the config has none.
    pub fn default_range(&self) -> (i64, i64) {
        match self {
            SensorKind::Temperature => (0, 30),
            SensorKind::Humidity => (0, 100),
            SensorKind::Wind => (0, 25),
            SensorKind::Rain => (0, 50),
            SensorKind::Speed => (0, 120),
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "C",
            SensorKind::Humidity => "%",
            SensorKind::Wind => "m/s",
            SensorKind::Rain => "mm",
            SensorKind::Speed => "km/h",
        }
    }
}

/// Identity shared by every sensor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    sensor_type: String,
    sensor_name: String,
    config_section: String,
    mqtt_host: String,
    mqtt_topic: String,
}

impl SensorInfo {
    pub fn new(sensor_type: &str, sensor_name: &str, config_section: &str) -> Self {
        SensorInfo {
            sensor_type: sensor_type.into(),
            sensor_name: sensor_name.into(),
            config_section: config_section.into(),
            mqtt_host: String::new(),
            mqtt_topic: String::new(),
        }
    }

    pub fn with_mqtt(mut self, host: &str, topic: &str) -> Self {
        self.mqtt_host = host.into();
        self.mqtt_topic = topic.into();
        self
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn sensor_name(&self) -> &str {
        &self.sensor_name
    }

    pub fn config_section(&self) -> &str {
        &self.config_section
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_topic(&self) -> &str {
        &self.mqtt_topic
    }
}

impl fmt::Display for SensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Sensor, type={}, name={}>", self.sensor_type, self.sensor_name)
    }
}

/// A physical or virtual sensor.
#[async_trait]
pub trait Sensor: Send + Sync {
    fn info(&self) -> &SensorInfo;

    fn kind(&self) -> SensorKind;

    /// Take one reading.
    async fn collect_data(&self) -> SensorResult<Measurement>;

    fn make_response(&self, data: serde_json::Value, errors: Option<Vec<String>>) -> Response {
        Response::new(self.info().sensor_name(), data, errors)
    }
}


// EOF
