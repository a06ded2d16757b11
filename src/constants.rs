// constants.rs
//
// Keywords shared by config files, the CLI and the sensor hub.

pub const DELIM_STD: &str = "|";
pub const DELIM_VAL: &str = ":";
pub const EMPTY_STR: &str = "";

pub const SENSOR_ALL: &str = "all";
pub const SENSOR_MAIN: &str = "f451_main";
pub const SENSOR_TEMP: &str = "f451_temperature";
pub const SENSOR_HUMID: &str = "f451_humidity";
pub const SENSOR_WIND: &str = "f451_wind";
pub const SENSOR_RAIN: &str = "f451_rain";
pub const SENSOR_SPEED: &str = "f451_speed";

pub const SECTION_MQTT: &str = "f451_mqtt";
pub const SECTION_INFLUXDB: &str = "f451_influxdb";
pub const SECTION_API: &str = "f451_api";

pub const KWD_SENSORS: &str = "sensors";
pub const KWD_SENSOR_MAP: &str = "sensor_map";
pub const KWD_LOG_LEVEL: &str = "log_level";
pub const KWD_TAGS: &str = "tags";

pub const SNSR_TYPE_MAIN: &str = "main";
pub const SNSR_TYPE_TEMP: &str = "temp";
pub const SNSR_TYPE_HUMID: &str = "humid";
pub const SNSR_TYPE_WIND: &str = "wind";
pub const SNSR_TYPE_RAIN: &str = "rain";
pub const SNSR_TYPE_SPEED: &str = "speed";

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILURE: &str = "failure";

/// Publish delay bounds, in seconds.
pub const MIN_DELAY: u64 = 1;
pub const MAX_DELAY: u64 = 3600;

pub const APP_ENV_CONFIG: &str = "F451_SENSORS_CONFIG";
pub const APP_ENV_SECRETS: &str = "F451_SENSORS_SECRETS";

pub const APP_LOG: &str = "f451-sensors.log";
pub const APP_CONFIG: &str = "f451-sensors.config.toml";
pub const APP_SECRETS: &str = "f451-sensors.secrets.toml";

// EOF
