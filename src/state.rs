// state.rs

use crate::*;

pub struct MyState {
    pub config: MyConfig,
    pub sensors: Arc<Sensors>,
    pub uptime: RwLock<u64>,
    pub api_cnt: AtomicU64,
    pub data: RwLock<SensorValues>,
    pub data_updated: RwLock<bool>,
}

impl MyState {
    pub fn new(config: MyConfig) -> SensorResult<Self> {
        let sensors = Sensors::new(&config)?;
        Ok(Self::with_sensors(config, sensors))
    }

    pub fn with_sensors(config: MyConfig, sensors: Sensors) -> Self {
        let n_sensors = sensors.sensors().values().filter(|s| s.is_some()).count();
        MyState {
            config,
            sensors: Arc::new(sensors),
            uptime: RwLock::new(0),
            api_cnt: AtomicU64::new(0),
            data: RwLock::new(SensorValues::with_capacity(n_sensors)),
            data_updated: RwLock::new(false),
        }
    }
}

// EOF
