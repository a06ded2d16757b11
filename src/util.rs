// util.rs

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::*;

use crate::{DELIM_STD, DELIM_VAL, SensorError, SensorResult};

/// True if `path` exists and is a regular file.
pub fn is_valid_file<P: AsRef<Path>>(path: P) -> bool {
    let p = path.as_ref();
    p.exists() && p.is_file()
}

/// Check that a file exists. With `strict` a missing file is an error,
/// otherwise the path is handed back as-is.
pub fn verify_file<P: AsRef<Path>>(path: P, strict: bool) -> SensorResult<PathBuf> {
    let p = path.as_ref();
    if strict && !is_valid_file(p) {
        let name = p.to_string_lossy();
        let name = if name.is_empty() { "<blank>".into() } else { name };
        let msg = format!("File '{name}' does not exist.");
        error!("{msg}");
        return Err(SensorError::InvalidAttribute(msg));
    }
    Ok(p.to_path_buf())
}

/// Split a `a|b|c` attribute into trimmed, non-empty items.
pub fn convert_attrib_str_to_list(s: &str) -> Vec<String> {
    s.split(DELIM_STD)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `key:value|key:value` into a map. Items without a value
/// separator or with an empty key are skipped.
pub fn process_key_value_map(s: &str) -> HashMap<String, String> {
    s.split(DELIM_STD)
        .filter_map(|item| {
            let (k, v) = item.split_once(DELIM_VAL)?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// First letter upper case, the rest lower case.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    }
}

/// `93784` -> `1d 02:03:04`
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let mins = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{days}d {hours:02}:{mins:02}:{s:02}")
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home<P: AsRef<Path>>(path: P) -> PathBuf {
    let p = path.as_ref();
    match (p.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => p.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attrib_list() {
        assert_eq!(
            convert_attrib_str_to_list(" f451_temperature | |f451_rain"),
            vec!["f451_temperature".to_string(), "f451_rain".to_string()]
        );
        assert!(convert_attrib_str_to_list("").is_empty());
    }

    #[test]
    fn test_key_value_map() {
        let m = process_key_value_map("temp:f451_temperature| humid : f451_humidity|junk|:nokey");
        assert_eq!(m.len(), 2);
        assert_eq!(m["temp"], "f451_temperature");
        assert_eq!(m["humid"], "f451_humidity");
        assert!(process_key_value_map("").is_empty());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("chameleon"), "Chameleon");
        assert_eq!(capitalize("MAIN"), "Main");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0d 00:00:00");
        assert_eq!(format_uptime(93784), "1d 02:03:04");
    }

    #[test]
    fn test_verify_file() {
        let missing = std::env::temp_dir().join("f451-sensors-no-such-file");
        assert!(verify_file(&missing, false).is_ok());
        assert!(matches!(
            verify_file(&missing, true),
            Err(SensorError::InvalidAttribute(_))
        ));
        assert_eq!(
            verify_file("", true),
            Err(SensorError::InvalidAttribute("File '<blank>' does not exist.".into()))
        );
    }
}

// EOF
