//! Application configuration structures.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::collector::DEFAULT_POLL_TIMEOUT;
use crate::collector::asic::AsicConfig;
use crate::collector::hwmon::{HwmonConfig, SensorConfig, SensorList};
use crate::collector::mstpd::MstpdConfig;
use crate::collector::smonctl::SmonctlConfig;

use super::validation::{ConfigError, expand_env_vars, validate_sensors};

// =============================================================================
// Constants
// =============================================================================

/// Default scrape port.
pub const DEFAULT_PORT: u16 = 9457;

/// Default scrape path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

fn default_poll_timeout() -> Duration {
    DEFAULT_POLL_TIMEOUT
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand environment references in `content`, then parse it as YAML.
fn parse_yaml<T: DeserializeOwned>(content: &str, origin: &str) -> Result<T, ConfigError> {
    serde_yaml::from_str(&expand_env_vars(content)?).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

fn invalid(setting: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        setting,
        message: message.into(),
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "::").
    pub bind: String,

    /// Server port (default: 9457).
    pub port: u16,

    /// Path serving the exposition (default: "/metrics").
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "::".to_string(),
            port: DEFAULT_PORT,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

// =============================================================================
// Collector Configuration
// =============================================================================

/// Source configurations, one block per source family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    /// switchd driver counters.
    pub asic: AsicConfig,

    /// hwmon sensors read from sysfs.
    pub hwmon: HwmonConfig,

    /// hwmon sensors reported by smonctl.
    pub smonctl: SmonctlConfig,

    /// Spanning-tree port details from mstpctl.
    pub mstpd: MstpdConfig,
}

impl CollectorsConfig {
    /// Names of the enabled sources, in registration order.
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            (self.asic.enabled, "asic"),
            (self.hwmon.enabled, "hwmon"),
            (self.smonctl.enabled, "smonctl"),
            (self.mstpd.enabled, "mstpd"),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| enabled.then_some(name))
        .collect()
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Deadline for one source's poll (default: 30s).
    #[serde(default = "default_poll_timeout", with = "humantime_serde")]
    pub poll_timeout: Duration,

    /// Source configurations.
    #[serde(default)]
    pub collectors: CollectorsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            collectors: CollectorsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config: Self = parse_yaml(&read_file(path)?, &path.display().to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = parse_yaml(content, "inline config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a bad server or poll setting and
    /// `ConfigError::Sensor` for an incomplete inline hwmon sensor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_address()?;

        if self.server.port == 0 {
            return Err(invalid("server port", "must be non-zero"));
        }

        let path = &self.server.metrics_path;
        if !path.starts_with('/') || path.len() < 2 {
            return Err(invalid(
                "metrics path",
                format!("'{path}' must start with '/' and name a route"),
            ));
        }

        if self.poll_timeout.is_zero() {
            return Err(invalid("poll_timeout", "must be positive"));
        }

        validate_sensors(&self.collectors.hwmon.sensors)?;

        Ok(())
    }

    /// Socket address the server binds to.
    pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.server.bind.parse().map_err(|_| {
            invalid(
                "server bind address",
                format!("'{}' is not an IP address", self.server.bind),
            )
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Sensors for the hwmon source.
    ///
    /// Inline `sensors` win; otherwise the sensor list file named by
    /// `collectors.hwmon.config` is loaded.
    pub fn hwmon_sensors(&self) -> Result<Vec<SensorConfig>, ConfigError> {
        let hwmon = &self.collectors.hwmon;
        if !hwmon.sensors.is_empty() {
            return Ok(hwmon.sensors.clone());
        }
        match &hwmon.config {
            Some(path) => load_sensor_list(path),
            None => Err(invalid(
                "hwmon collector",
                "needs inline sensors or a sensor list file",
            )),
        }
    }
}

/// Load and validate a hwmon sensor list file.
pub fn load_sensor_list(path: impl AsRef<Path>) -> Result<Vec<SensorConfig>, ConfigError> {
    let path = path.as_ref();
    let list: SensorList = parse_yaml(&read_file(path)?, &path.display().to_string())?;
    validate_sensors(&list.sensors)?;
    Ok(list.sensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::hwmon::SensorType;
    use std::path::PathBuf;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "::");
        assert_eq!(config.port, 9457);
        assert_eq!(config.metrics_path, "/metrics");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.collectors.enabled().is_empty());
        assert_eq!(
            config.listen_address().unwrap(),
            "[::]:9457".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
server:
  bind: 127.0.0.1
  port: 9100
  metrics_path: /cumulus
poll_timeout: 5s
collectors:
  asic:
    enabled: true
    settle_delay: 2ms
  hwmon:
    enabled: true
    sensors:
      - description: CPU
        driver_path: /sys/class/hwmon/hwmon0
        driver_hwmon: temp1
        type: temp
  mstpd:
    enabled: true
    mstpctl_path: /usr/sbin/mstpctl
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.metrics_path, "/cumulus");
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.collectors.asic.settle_delay, Duration::from_millis(2));
        assert_eq!(
            config.collectors.asic.root,
            PathBuf::from("/cumulus/switchd/run")
        );
        assert_eq!(
            config.collectors.mstpd.mstpctl_path,
            PathBuf::from("/usr/sbin/mstpctl")
        );
        assert_eq!(config.collectors.enabled(), vec!["asic", "hwmon", "mstpd"]);
        assert_eq!(config.hwmon_sensors().unwrap().len(), 1);
    }

    #[test]
    fn test_env_expansion_in_yaml() {
        let yaml = "collectors:\n  asic:\n    root: ${NONEXISTENT_ASIC_ROOT_98765:-/tmp/switchd}\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.collectors.asic.root, PathBuf::from("/tmp/switchd"));
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind = "not-an-ip".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_metrics_path() {
        let mut config = AppConfig::default();
        config.server.metrics_path = "metrics".to_string();
        assert!(config.validate().is_err());

        config.server.metrics_path = "/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_poll_timeout() {
        let result = AppConfig::from_yaml("poll_timeout: 0s\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                setting: "poll_timeout",
                ..
            })
        ));
    }

    #[test]
    fn test_config_validation_inline_sensor() {
        let yaml = r#"
collectors:
  hwmon:
    sensors:
      - description: Fan
        driver_path: /sys/class/hwmon/hwmon2
        type: fan
"#;
        let result = AppConfig::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::Sensor { index: 0, .. })));
    }

    #[test]
    fn test_hwmon_sensors_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hwmon.yml");
        std::fs::write(
            &path,
            "sensors:\n  - description: PSU fan\n    driver_path: /sys/devices/psu/fan1\n    type: raw\n",
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.collectors.hwmon = HwmonConfig::default().with_config(&path);

        let sensors = config.hwmon_sensors().unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].sensor_type, SensorType::Raw);
    }

    #[test]
    fn test_hwmon_sensors_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.collectors.hwmon = HwmonConfig::default().with_config(dir.path().join("absent.yml"));

        assert!(matches!(
            config.hwmon_sensors(),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  port: 9999\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.bind, "::");
        assert_eq!(config.poll_timeout, DEFAULT_POLL_TIMEOUT);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "poll_timeout: soon\n").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));

        std::fs::write(
            &path,
            "collectors:\n  asic:\n    root: ${NONEXISTENT_ASIC_ROOT_24680}\n",
        )
        .unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::UnsetVariable { .. })
        ));
    }
}
