// config.rs

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    APP_NAME, SensorError, SensorKind, SensorResult, expand_home,
};

pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_MQTT_URL: &str = "mqtt://mqtt.eclipseprojects.io:1883";
pub const DEFAULT_MQTT_TOPIC: &str = "temperature";

const DEFAULT_SENSOR_RETRIES: u32 = 5;
const DEFAULT_RETRY_WAIT: u64 = 1;
const DEFAULT_POLL_DELAY: u64 = 30;
const DEFAULT_PUBLISH_DELAY: u64 = 1;
const DEFAULT_KEEP_ALIVE: u64 = 25;
pub const DEFAULT_SPOOL_MAX: usize = 10_000;

/// The `[f451_main]` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainSection {
    /// Default sensors, `|` separated.
    pub sensors: String,
    /// Aliases, `alias:sensor|alias:sensor`.
    pub sensor_map: String,
    pub log_level: Option<String>,
    pub retries: u32,
    pub wait: u64,
    pub delay: u64,
}

impl MainSection {
    /// Map the `log_level` keyword (`DEBUG`, `WARNING`, ...) to a log filter.
    pub fn log_filter(&self) -> &'static str {
        match self.log_level.as_deref().map(str::to_uppercase).as_deref() {
            Some("OFF") => "off",
            Some("CRITICAL") | Some("ERROR") => "error",
            Some("WARNING") | Some("WARN") => "warn",
            Some("DEBUG") => "debug",
            Some("NOTSET") | Some("TRACE") => "trace",
            _ => "info",
        }
    }
}

impl Default for MainSection {
    fn default() -> Self {
        Self {
            sensors: String::new(),
            sensor_map: String::new(),
            log_level: None,
            retries: DEFAULT_SENSOR_RETRIES,
            wait: DEFAULT_RETRY_WAIT,
            delay: DEFAULT_POLL_DELAY,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Simulated readings.
    #[default]
    Chameleon,
    /// Numeric value read from a file, e.g. a thermal zone.
    Sysfs,
}

/// One `[f451_<sensor>]` section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    pub provider: ProviderKind,
    pub name: Option<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub path: Option<PathBuf>,
    pub scale: Option<f64>,
    pub unit: Option<String>,
    pub mqtt_topic: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    pub enable: bool,
    pub url: String,
    pub topic: String,
    pub client_id: String,
    pub keep_alive: u64,
    pub delay: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            enable: false,
            url: option_env!("MQTT_URL").unwrap_or(DEFAULT_MQTT_URL).into(),
            topic: DEFAULT_MQTT_TOPIC.into(),
            client_id: APP_NAME.into(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            delay: DEFAULT_PUBLISH_DELAY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxSection {
    pub url: String,
    pub org: String,
    pub bucket: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub measurement: String,
    pub spool: Option<PathBuf>,
    /// Most points kept in the spool, oldest are dropped first.
    pub spool_max: usize,
}

impl Default for InfluxSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".into(),
            org: String::new(),
            bucket: String::new(),
            token: String::new(),
            measurement: "f451_sensors".into(),
            spool: None,
            spool_max: DEFAULT_SPOOL_MAX,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub port: u16,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            port: option_env!("API_PORT")
                .unwrap_or("-")
                .parse()
                .unwrap_or(DEFAULT_API_PORT),
        }
    }
}

/// Merged contents of the config and secrets files.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MyConfig {
    #[serde(rename = "f451_main", default)]
    pub main: MainSection,

    #[serde(rename = "f451_temperature", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<SensorSection>,
    #[serde(rename = "f451_humidity", default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<SensorSection>,
    #[serde(rename = "f451_wind", default, skip_serializing_if = "Option::is_none")]
    pub wind: Option<SensorSection>,
    #[serde(rename = "f451_rain", default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<SensorSection>,
    #[serde(rename = "f451_speed", default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<SensorSection>,

    #[serde(rename = "f451_mqtt", default)]
    pub mqtt: MqttSection,
    #[serde(rename = "f451_influxdb", default)]
    pub influxdb: InfluxSection,
    #[serde(rename = "f451_api", default)]
    pub api: ApiSection,
}

impl MyConfig {
    pub fn sensor_section(&self, kind: SensorKind) -> Option<&SensorSection> {
        match kind {
            SensorKind::Temperature => self.temperature.as_ref(),
            SensorKind::Humidity => self.humidity.as_ref(),
            SensorKind::Wind => self.wind.as_ref(),
            SensorKind::Rain => self.rain.as_ref(),
            SensorKind::Speed => self.speed.as_ref(),
        }
    }

    pub fn from_toml_str(s: &str) -> SensorResult<Self> {
        let table = s
            .parse::<toml::Table>()
            .map_err(|e| SensorError::InvalidAttribute(format!("Cannot parse config: {e}")))?;
        Self::from_table(table)
    }

    fn from_table(table: toml::Table) -> SensorResult<Self> {
        toml::Value::Table(table)
            .try_into::<MyConfig>()
            .map_err(|e| SensorError::InvalidAttribute(format!("Cannot parse config: {e}")))
    }

    /// Read and merge config files in order, later files override
    /// earlier ones key by key.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> SensorResult<Self> {
        let mut merged = toml::Table::new();
        for p in paths {
            let path = expand_home(p);
            if !path.exists() {
                let msg = format!("Config file '{}' does not exist.", path.display());
                error!("{msg}");
                return Err(SensorError::InvalidAttribute(msg));
            }
            info!("Reading config from {}", path.display());
            let s = fs::read_to_string(&path).map_err(|e| {
                SensorError::InvalidAttribute(format!("Cannot read '{}': {e}", path.display()))
            })?;
            let table = s.parse::<toml::Table>().map_err(|e| {
                SensorError::InvalidAttribute(format!("Cannot parse '{}': {e}", path.display()))
            })?;
            merge_tables(&mut merged, table);
        }
        Self::from_table(merged)
    }
}

/// Recursively merge `overlay` into `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(o) = value {
            if let Some(toml::Value::Table(b)) = base.get_mut(&key) {
                merge_tables(b, o);
                continue;
            }
            base.insert(key, toml::Value::Table(o));
        } else {
            base.insert(key, value);
        }
    }
}

/// Look for `name` in the usual places: current dir, next to the
/// executable, home dir and `/etc/f451-sensors`.
pub fn get_valid_location(name: &str) -> Option<PathBuf> {
    let clean = name.trim_matches('/');
    let mut dirs = Vec::with_capacity(4);
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(dir);
    }
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home));
    }
    dirs.push(PathBuf::from(format!("/etc/{APP_NAME}")));

    dirs.into_iter().map(|d| d.join(clean)).find(|p| p.exists())
}

/// Pick the config and secrets files: explicit path (flag or env var)
/// first, then the default locations. Missing defaults are skipped.
pub fn resolve_config_files(
    config: Option<PathBuf>,
    secrets: Option<PathBuf>,
    config_name: &str,
    secrets_name: &str,
) -> Vec<PathBuf> {
    [(config, config_name), (secrets, secrets_name)]
        .into_iter()
        .filter_map(|(p, name)| p.or_else(|| get_valid_location(name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"
[f451_main]
sensors = "f451_temperature|f451_humidity"
sensor_map = "temp:f451_temperature|humid:f451_humidity"

[f451_temperature]
min = -10
max = 35

[f451_humidity]

[f451_influxdb]
org = "home"
bucket = "sensors"
"#;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!("f451-sensors-test-{}-{name}", std::process::id()));
        fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn test_parse() {
        let cfg = MyConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(cfg.main.sensors, "f451_temperature|f451_humidity");
        assert_eq!(cfg.main.retries, DEFAULT_SENSOR_RETRIES);
        let t = cfg.sensor_section(SensorKind::Temperature).unwrap();
        assert_eq!(t.provider, ProviderKind::Chameleon);
        assert_eq!((t.min, t.max), (Some(-10), Some(35)));
        assert_eq!(cfg.sensor_section(SensorKind::Humidity), Some(&SensorSection::default()));
        assert!(cfg.sensor_section(SensorKind::Wind).is_none());
        assert_eq!(cfg.mqtt.topic, DEFAULT_MQTT_TOPIC);
        assert_eq!(cfg.influxdb.bucket, "sensors");
    }

    #[test]
    fn test_log_filter() {
        let mut main = MainSection::default();
        assert_eq!(main.log_filter(), "info");
        main.log_level = Some("warning".into());
        assert_eq!(main.log_filter(), "warn");
        main.log_level = Some("CRITICAL".into());
        assert_eq!(main.log_filter(), "error");
        main.log_level = Some("OFF".into());
        assert_eq!(main.log_filter(), "off");
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            MyConfig::from_toml_str("[f451_main\n"),
            Err(SensorError::InvalidAttribute(_))
        ));
        assert!(matches!(
            MyConfig::from_toml_str("[f451_temperature]\nprovider = \"thermocouple\"\n"),
            Err(SensorError::InvalidAttribute(_))
        ));
    }

    #[test]
    fn test_merge_files() {
        let config = temp_file("config.toml", CONFIG);
        let secrets = temp_file(
            "secrets.toml",
            "[f451_influxdb]\ntoken = \"s3cret\"\nbucket = \"override\"\n",
        );
        let cfg = MyConfig::from_files(&[&config, &secrets]).unwrap();
        assert_eq!(cfg.influxdb.org, "home");
        assert_eq!(cfg.influxdb.bucket, "override");
        assert_eq!(cfg.influxdb.token, "s3cret");

        // token never leaks through serialization
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("s3cret"));

        fs::remove_file(config).unwrap();
        fs::remove_file(secrets).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let missing = std::env::temp_dir().join("f451-sensors-missing.toml");
        assert!(matches!(
            MyConfig::from_files(&[missing]),
            Err(SensorError::InvalidAttribute(_))
        ));
    }

    #[test]
    fn test_resolve_explicit() {
        let files = resolve_config_files(
            Some(PathBuf::from("/tmp/a.toml")),
            Some(PathBuf::from("/tmp/b.toml")),
            "unused",
            "unused",
        );
        assert_eq!(files, vec![PathBuf::from("/tmp/a.toml"), PathBuf::from("/tmp/b.toml")]);

        let files = resolve_config_files(None, None, "f451-no-such-config", "f451-no-such-secrets");
        assert!(files.is_empty());
    }
}

// EOF
