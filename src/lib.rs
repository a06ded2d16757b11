// lib.rs

pub use std::{
    net,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub use anyhow::bail;
pub use chrono::{Local, TimeZone, Utc};
pub use log::{debug, error, info, trace, warn};
pub use serde::{Deserialize, Serialize};
pub use tokio::{
    sync::RwLock,
    time::{Duration, sleep},
};

pub mod constants;
pub use constants::*;

mod error;
pub use error::*;

mod util;
pub use util::*;

mod config;
pub use config::*;

mod response;
pub use response::*;

mod sensor;
pub use sensor::*;

mod chameleon;
pub use chameleon::*;

mod sysfs;
pub use sysfs::*;

mod sensors;
pub use sensors::*;

mod measure;
pub use measure::*;

mod state;
pub use state::*;

mod influx;
pub use influx::*;

mod spool;
pub use spool::*;

mod mqtt;
pub use mqtt::*;

mod apiserver;
pub use apiserver::*;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_TITLE: &str = "f451 Sensors Module";

pub const BUILD_TIMESTAMP: Option<&str> = option_env!("BUILD_TIMESTAMP");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Latest set of measurements, as served by the API.
#[derive(Clone, Debug, Serialize)]
pub struct SensorValues {
    pub timestamp: i64,
    pub last_update: String,
    pub uptime: u64,
    pub uptime_s: String,
    pub measurements: Vec<Measurement>,
}

impl SensorValues {
    pub fn new() -> Self {
        SensorValues {
            timestamp: 0,
            last_update: "-".to_string(),
            uptime: 0,
            uptime_s: "-".to_string(),
            measurements: Vec::new(),
        }
    }
    pub fn with_capacity(c: usize) -> Self {
        SensorValues {
            measurements: Vec::with_capacity(c),
            ..Self::new()
        }
    }
}

impl Default for SensorValues {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Uptime {
    pub uptime: u64,
    pub uptime_s: String,
}

impl Uptime {
    pub fn new(uptime: u64) -> Self {
        Uptime {
            uptime,
            uptime_s: format_uptime(uptime),
        }
    }
}

/// Version string shown by `--version`.
pub fn version_string() -> String {
    let mut s = format!("{APP_TITLE} ({APP_NAME}) v{APP_VERSION}");
    if let Some(commit) = GIT_COMMIT {
        s.push_str(&format!(" [{}]", &commit[..commit.len().min(8)]));
    }
    if let Some(ts) = BUILD_TIMESTAMP {
        s.push_str(&format!(" built {ts}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        let v = version_string();
        assert!(v.starts_with(&format!("f451 Sensors Module (f451-sensors) v{APP_VERSION}")));
        // git commit is only stamped when building from a checkout
        assert_eq!(v.contains(" ["), GIT_COMMIT.is_some());
        assert!(BUILD_TIMESTAMP.is_some());
    }

    #[test]
    fn test_uptime() {
        let up = Uptime::new(90061);
        assert_eq!(up.uptime_s, "1d 01:01:01");
    }
}

// EOF
