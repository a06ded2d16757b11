// chameleon.rs
//
// Simulated sensor, takes the shape of whatever slot it is configured in.

use async_trait::async_trait;
use rand::Rng;

use crate::*;

pub const CHAMELEON_NAME: &str = "chameleon";

pub struct Chameleon {
    info: SensorInfo,
    kind: SensorKind,
    min: i64,
    max: i64,
    unit: String,
}

impl Chameleon {
    pub fn new(kind: SensorKind, section: &SensorSection) -> SensorResult<Self> {
        let (def_min, def_max) = kind.default_range();
        let min = section.min.unwrap_or(def_min);
        let max = section.max.unwrap_or(def_max);
        if min > max {
            return Err(SensorError::InvalidAttribute(format!(
                "'{}' range {min}..{max} is empty",
                kind.section()
            )));
        }

        let name = section.name.as_deref().unwrap_or(CHAMELEON_NAME);
        Ok(Chameleon {
            info: SensorInfo::new(kind.sensor_type(), name, kind.section())
                .with_mqtt("", section.mqtt_topic.as_deref().unwrap_or_default()),
            kind,
            min,
            max,
            unit: section.unit.clone().unwrap_or_else(|| kind.default_unit().into()),
        })
    }

    pub fn range(&self) -> (i64, i64) {
        (self.min, self.max)
    }
}

#[async_trait]
impl Sensor for Chameleon {
    fn info(&self) -> &SensorInfo {
        &self.info
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    async fn collect_data(&self) -> SensorResult<Measurement> {
        let value = rand::thread_rng().gen_range(self.min..=self.max);
        debug!("{} {} -> {value}", self.info.sensor_name(), self.kind);
        Ok(Measurement::new(
            self.info.sensor_name(),
            self.kind,
            value as f64,
            &self.unit,
        ))
    }
}


// EOF
