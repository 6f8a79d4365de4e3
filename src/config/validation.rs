//! Configuration errors and value checks.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::collector::hwmon::{SensorConfig, SensorType};

/// Why the exporter configuration or hwmon sensor list was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config or sensor list file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The YAML does not have the expected shape.
    #[error("cannot parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// `${NAME}` refers to an unset variable and has no `:-default`.
    #[error("environment variable {name} is not set and has no default")]
    UnsetVariable { name: String },

    /// A hwmon sensor entry cannot be polled.
    #[error("hwmon sensor #{index} ({description:?}): {reason}")]
    Sensor {
        index: usize,
        description: String,
        reason: String,
    },

    /// A server or poll setting is out of range.
    #[error("invalid {setting}: {message}")]
    Invalid {
        setting: &'static str,
        message: String,
    },
}

/// Parse a poll deadline such as `30s`, `1m30s` or `500ms`.
///
/// Used for `--poll-timeout`; a zero deadline would fail every poll, so it
/// is rejected here rather than at startup validation.
///
/// # Examples
///
/// ```
/// use cumulus_exporter::config::parse_poll_timeout;
///
/// assert_eq!(parse_poll_timeout("1m30s").unwrap().as_secs(), 90);
/// assert!(parse_poll_timeout("0s").is_err());
/// ```
pub fn parse_poll_timeout(value: &str) -> Result<Duration, String> {
    let timeout = humantime::parse_duration(value.trim())
        .map_err(|e| format!("{e} (expected a duration such as 30s)"))?;
    if timeout.is_zero() {
        return Err("poll timeout must be positive".to_string());
    }
    Ok(timeout)
}

fn env_var_regex() -> &'static Regex {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    ENV_VAR.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    })
}

/// Substitute `${NAME}` and `${NAME:-default}` in raw config text.
///
/// An unset variable without a default is an error: silently expanding it
/// to nothing would turn paths such as `driver_path` into the empty string.
pub fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(input.len());
    let mut copied = 0;

    for caps in env_var_regex().captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        expanded.push_str(&input[copied..whole.start()]);

        let name = &caps[1];
        match (std::env::var(name), caps.get(2)) {
            (Ok(value), _) => expanded.push_str(&value),
            (Err(_), Some(default)) => expanded.push_str(default.as_str()),
            (Err(_), None) => {
                return Err(ConfigError::UnsetVariable {
                    name: name.to_string(),
                });
            }
        }
        copied = whole.end();
    }

    expanded.push_str(&input[copied..]);
    Ok(expanded)
}

/// Check a hwmon sensor list.
///
/// Every sensor needs a `driver_path`; all but raw sensors also need the
/// `driver_hwmon` attribute prefix.
pub fn validate_sensors(sensors: &[SensorConfig]) -> Result<(), ConfigError> {
    for (index, sensor) in sensors.iter().enumerate() {
        let reject = |reason: String| ConfigError::Sensor {
            index,
            description: sensor.description.clone(),
            reason,
        };

        if sensor.driver_path.as_os_str().is_empty() {
            return Err(reject("driver_path cannot be empty".to_string()));
        }

        let has_prefix = sensor
            .driver_hwmon
            .as_deref()
            .is_some_and(|prefix| !prefix.is_empty());
        if sensor.sensor_type != SensorType::Raw && !has_prefix {
            return Err(reject(format!(
                "{} sensors need driver_hwmon",
                sensor.sensor_type
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poll_timeout() {
        assert_eq!(parse_poll_timeout("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_poll_timeout(" 1m30s ").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_poll_timeout("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_poll_timeout_rejects() {
        assert!(parse_poll_timeout("").is_err());
        assert!(parse_poll_timeout("30").is_err());
        assert_eq!(
            parse_poll_timeout("0s").unwrap_err(),
            "poll timeout must be positive"
        );
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("root: /cumulus").unwrap(), "root: /cumulus");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result =
            expand_env_vars("root: ${NONEXISTENT_SWITCHD_ROOT_12345:-/cumulus/switchd/run}")
                .unwrap();
        assert_eq!(result, "root: /cumulus/switchd/run");

        let result = expand_env_vars("args: [${NONEXISTENT_SMONCTL_ARG_12345:-}]").unwrap();
        assert_eq!(result, "args: []");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("TEST_HWMON_FILE_EXPAND", "/etc/cumulus/hwmon.yml");
        }
        let result = expand_env_vars("config: ${TEST_HWMON_FILE_EXPAND} # hwmon").unwrap();
        assert_eq!(result, "config: /etc/cumulus/hwmon.yml # hwmon");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("TEST_HWMON_FILE_EXPAND");
        }
    }

    #[test]
    fn test_expand_env_vars_unset_without_default() {
        let err = expand_env_vars("driver_path: ${NONEXISTENT_DRIVER_PATH_12345}").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsetVariable { ref name } if name == "NONEXISTENT_DRIVER_PATH_12345"
        ));
    }

    #[test]
    fn test_validate_sensors() {
        let ok = vec![
            SensorConfig::new("CPU", "/sys/class/hwmon/hwmon0", SensorType::Temp)
                .with_driver_hwmon("temp1"),
            SensorConfig::new("PSU fan", "/sys/devices/psu/fan1", SensorType::Raw),
        ];
        assert!(validate_sensors(&ok).is_ok());

        let no_prefix = vec![
            ok[0].clone(),
            SensorConfig::new("Fan", "/sys/class/hwmon/hwmon1", SensorType::Fan),
        ];
        let err = validate_sensors(&no_prefix).unwrap_err();
        assert!(matches!(err, ConfigError::Sensor { index: 1, .. }));
        assert!(err.to_string().contains("fan sensors need driver_hwmon"));

        let no_path = vec![SensorConfig::new("Raw", "", SensorType::Raw)];
        let err = validate_sensors(&no_path).unwrap_err();
        assert!(err.to_string().contains("driver_path cannot be empty"));
    }
}
