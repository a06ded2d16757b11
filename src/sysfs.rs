// sysfs.rs
//
// Sensor backed by a file holding a single number, such as
// /sys/class/thermal/thermal_zone0/temp (millidegrees, scale = 1000).

use std::path::PathBuf;

use async_trait::async_trait;

use crate::*;

pub const SYSFS_NAME: &str = "sysfs";

pub struct SysfsSensor {
    info: SensorInfo,
    kind: SensorKind,
    path: PathBuf,
    scale: f64,
    unit: String,
}

impl SysfsSensor {
    pub fn new(kind: SensorKind, section: &SensorSection) -> SensorResult<Self> {
        let path = section.path.as_ref().ok_or_else(|| {
            SensorError::MissingAttribute(format!("'path' in section '{}'", kind.section()))
        })?;
        let path = verify_file(expand_home(path), true)?;

        let scale = section.scale.unwrap_or(1.0);
        if scale == 0.0 || !scale.is_finite() {
            return Err(SensorError::InvalidAttribute(format!(
                "'scale' in section '{}' must be a non-zero number",
                kind.section()
            )));
        }

        let name = section.name.as_deref().unwrap_or(SYSFS_NAME);
        Ok(SysfsSensor {
            info: SensorInfo::new(kind.sensor_type(), name, kind.section())
                .with_mqtt("", section.mqtt_topic.as_deref().unwrap_or_default()),
            kind,
            path,
            scale,
            unit: section.unit.clone().unwrap_or_else(|| kind.default_unit().into()),
        })
    }

    fn access_error(&self, reason: String) -> SensorError {
        SensorError::SensorAccess {
            sensor: self.info.sensor_name().into(),
            reason,
        }
    }
}

#[async_trait]
impl Sensor for SysfsSensor {
    fn info(&self) -> &SensorInfo {
        &self.info
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    async fn collect_data(&self) -> SensorResult<Measurement> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.access_error(format!("{}: {e}", self.path.display())))?;
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| self.access_error(format!("{:?}: {e}", raw.trim())))?;
        Ok(Measurement::new(
            self.info.sensor_name(),
            self.kind,
            value / self.scale,
            &self.unit,
        ))
    }
}


// EOF
