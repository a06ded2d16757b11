// sensors.rs
//
// The hub: owns every configured sensor and resolves sensor names.

use std::collections::HashMap;

use futures::future::join_all;
use indexmap::IndexMap;
use strum::IntoEnumIterator;

use crate::*;

pub const SRV_PROVIDER: &str = "Main";

pub type SharedSensor = Arc<dyn Sensor>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry: u32,
    pub wait_retry: Duration,
}

impl RetryPolicy {
    pub fn new(max_retry: u32, wait_secs: u64) -> Self {
        RetryPolicy {
            max_retry: max_retry.max(1),
            wait_retry: Duration::from_secs(wait_secs),
        }
    }

    pub fn from_config(main: &MainSection) -> Self {
        Self::new(main.retries, main.wait)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MainSection::default())
    }
}

/// Build the sensor configured for a slot.
pub fn build_sensor(kind: SensorKind, section: &SensorSection) -> SensorResult<SharedSensor> {
    Ok(match section.provider {
        ProviderKind::Chameleon => Arc::new(Chameleon::new(kind, section)?),
        ProviderKind::Sysfs => Arc::new(SysfsSensor::new(kind, section)?),
    })
}

pub struct Sensors {
    info: SensorInfo,
    default_sensors: Vec<String>,
    sensor_map: HashMap<String, String>,
    sensors: IndexMap<String, Option<SharedSensor>>,
}

impl Sensors {
    /// Set up every slot. A slot is enabled iff its section is present.
    pub fn new(config: &MyConfig) -> SensorResult<Self> {
        let mut sensors = IndexMap::new();
        for kind in SensorKind::iter() {
            let slot = match config.sensor_section(kind) {
                None => None,
                Some(section) => {
                    let s = build_sensor(kind, section)?;
                    info!("Sensor {} enabled: {}", kind.section(), s.info());
                    Some(s)
                }
            };
            sensors.insert(kind.section().to_string(), slot);
        }

        let mqtt_host = broker_addr(&config.mqtt.url)
            .map(|(host, _)| host)
            .unwrap_or_default();
        Ok(Sensors {
            info: SensorInfo::new(SNSR_TYPE_MAIN, SRV_PROVIDER, SENSOR_MAIN)
                .with_mqtt(&mqtt_host, &config.mqtt.topic),
            default_sensors: convert_attrib_str_to_list(&config.main.sensors),
            sensor_map: process_key_value_map(&config.main.sensor_map),
            sensors,
        })
    }

    pub fn info(&self) -> &SensorInfo {
        &self.info
    }

    /// Put a sensor into a slot, or disable it with `None`.
    pub fn set_sensor(&mut self, kind: SensorKind, sensor: Option<SharedSensor>) {
        self.sensors.insert(kind.section().to_string(), sensor);
    }

    pub fn sensors(&self) -> &IndexMap<String, Option<SharedSensor>> {
        &self.sensors
    }

    pub fn sensor(&self, name: &str) -> Option<&SharedSensor> {
        self.sensors.get(name).and_then(Option::as_ref)
    }

    pub fn temperature(&self) -> Option<&SharedSensor> {
        self.sensor(SENSOR_TEMP)
    }

    pub fn humidity(&self) -> Option<&SharedSensor> {
        self.sensor(SENSOR_HUMID)
    }

    pub fn wind(&self) -> Option<&SharedSensor> {
        self.sensor(SENSOR_WIND)
    }

    pub fn rain(&self) -> Option<&SharedSensor> {
        self.sensor(SENSOR_RAIN)
    }

    pub fn speed(&self) -> Option<&SharedSensor> {
        self.sensor(SENSOR_SPEED)
    }

    pub fn valid_sensors(&self) -> Vec<String> {
        self.sensors.keys().cloned().collect()
    }

    pub fn default_sensors(&self) -> &[String] {
        &self.default_sensors
    }

    pub fn sensor_map(&self) -> &HashMap<String, String> {
        &self.sensor_map
    }

    fn verify_sensor(&self, name: &str, force: bool) -> bool {
        if force {
            !name.is_empty() && (self.sensors.contains_key(name) || self.sensor_map.contains_key(name))
        } else {
            !name.is_empty()
        }
    }

    /// Every name is a known slot or alias.
    pub fn is_valid_sensor<S: AsRef<str>>(&self, names: &[S]) -> bool {
        !names.is_empty() && names.iter().all(|n| self.verify_sensor(n.as_ref(), true))
    }

    /// Every name is a slot that has a sensor in it.
    pub fn is_enabled_sensor<S: AsRef<str>>(&self, names: &[S]) -> bool {
        !names.is_empty() && names.iter().all(|n| self.sensor(n.as_ref()).is_some())
    }

    /// Turn user supplied names into enabled slot names. Aliases are
    /// mapped, unknown names are dropped when `strict`, and disabled
    /// slots are always dropped.
    pub fn process_sensor_list<S: AsRef<str>>(&self, names: &[S], strict: bool) -> Vec<String> {
        names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| self.verify_sensor(n, strict))
            .map(|n| self.sensor_map.get(n).map(String::as_str).unwrap_or(n))
            .filter(|n| self.is_enabled_sensor(&[*n]))
            .map(String::from)
            .collect()
    }

    pub fn process_sensor_str(&self, names: &str, strict: bool) -> Vec<String> {
        self.process_sensor_list(&convert_attrib_str_to_list(names), strict)
    }

    /// MQTT topic for a slot: the sensor's own topic, or `<base>/<type>`.
    pub fn topic_for(&self, name: &str, base: &str) -> String {
        match self.sensor(name) {
            Some(s) if !s.info().mqtt_topic().is_empty() => s.info().mqtt_topic().to_string(),
            Some(s) => format!("{base}/{}", s.info().sensor_type()),
            None => base.to_string(),
        }
    }

    /// Collect from the given sensors (or the defaults) concurrently.
    /// One response per resolved sensor, in resolution order.
    pub async fn collect_data(
        &self,
        names: Option<&[String]>,
        retry: RetryPolicy,
    ) -> SensorResult<Vec<Response>> {
        let requested = names.unwrap_or(&self.default_sensors);
        let resolved = self.process_sensor_list(requested, true);
        if resolved.is_empty() {
            let sensor = requested.join(DELIM_STD);
            error!("Invalid sensor(s): {sensor:?}");
            return Err(SensorError::InvalidSensor { sensor });
        }

        let jobs = resolved
            .iter()
            .filter_map(|name| self.sensor(name))
            .map(|s| collect_with_retry(s.as_ref(), retry));
        Ok(join_all(jobs).await)
    }
}

async fn collect_with_retry(sensor: &dyn Sensor, retry: RetryPolicy) -> Response {
    let mut errors = Vec::new();
    for attempt in 1..=retry.max_retry {
        match sensor.collect_data().await {
            Ok(m) => {
                debug!("{} attempt {attempt}: {m:?}", sensor.info());
                let data = serde_json::to_value(&m).unwrap_or_default();
                return sensor.make_response(data, None);
            }
            Err(e) => {
                warn!("{} attempt {attempt} failed: {e}", sensor.info());
                errors.push(e.to_string());
                if attempt < retry.max_retry {
                    sleep(retry.wait_retry).await;
                }
            }
        }
    }
    sensor.make_response(serde_json::Value::Null, Some(errors))
}


// EOF
