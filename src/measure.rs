// measure.rs

use crate::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub sensor: String,
    pub kind: SensorKind,
    pub value: f64,
    pub unit: String,
    pub timestamp: i64,
}

impl Measurement {
    pub fn new(sensor: &str, kind: SensorKind, value: f64, unit: &str) -> Self {
        Measurement {
            sensor: sensor.into(),
            kind,
            value,
            unit: unit.into(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Collect from every enabled sensor on a fixed interval and keep the
/// latest values in the shared state.
pub async fn poll_sensors(state: Arc<MyState>) -> anyhow::Result<()> {
    let delay = state.config.main.delay.max(MIN_DELAY);
    let retry = RetryPolicy::from_config(&state.config.main);
    let names = state.sensors.process_sensor_list(&state.sensors.valid_sensors(), true);
    if names.is_empty() {
        warn!("No sensors enabled, nothing to poll.");
    }

    loop {
        if !names.is_empty() {
            match state.sensors.collect_data(Some(&names), retry).await {
                Ok(responses) => {
                    let measurements = responses
                        .iter()
                        .filter_map(|r| {
                            if !r.is_ok() {
                                error!("Poll failed: {r}");
                            }
                            r.measurement()
                        })
                        .collect::<Vec<_>>();
                    update_values(&state, measurements).await;
                }
                Err(e) => error!("Poll error: {e}"),
            }
        }
        sleep(Duration::from_secs(delay)).await;
    }
}

async fn update_values(state: &MyState, measurements: Vec<Measurement>) {
    let uptime = *state.uptime.read().await;
    let now = Local::now();
    {
        let mut data = state.data.write().await;
        data.timestamp = now.timestamp();
        data.last_update = now.format("%Y-%m-%d %H:%M:%S %Z").to_string();
        data.uptime = uptime;
        data.uptime_s = format_uptime(uptime);
        data.measurements = measurements;
    }
    *state.data_updated.write().await = true;
    debug!("Sensor values updated.");
}

pub async fn uptime_ticker(state: Arc<MyState>) -> anyhow::Result<()> {
    let mut uptime: u64 = 0;
    loop {
        sleep(Duration::from_secs(2)).await;
        uptime += 2;
        *(state.uptime.write().await) = uptime;
    }
}


// EOF
