//! Hardware-monitor sensors read from the kernel hwmon sysfs tree.
//!
//! - [`HwmonSource`]: reads a configured list of sensors from sysfs
//! - [`descriptors`]: the descriptor set, shared with the smonctl source

pub mod descriptors;
mod parser;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::collector::{Emitter, Source};
use crate::metric::MetricDescriptor;

pub use parser::{Attribute, attributes, temperature_sensor_type};

/// Source name used in logs and error reports.
pub const NAME: &str = "HwmonCollector";

/// Default sensor list file.
pub const DEFAULT_SENSOR_FILE: &str = "hwmon.yml";

/// Parser family of a sensor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SensorType {
    Voltage,
    Fan,
    Temp,
    Current,
    Raw,
}

/// One physical sensor to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Human-readable description, exported as a label.
    pub description: String,
    /// sysfs directory of the driver, or the value file for raw sensors.
    pub driver_path: PathBuf,
    /// Attribute file prefix, e.g. `temp1`.
    #[serde(default)]
    pub driver_hwmon: Option<String>,
    /// Parser family.
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
}

impl SensorConfig {
    /// Create a sensor entry.
    pub fn new(
        description: impl Into<String>,
        driver_path: impl Into<PathBuf>,
        sensor_type: SensorType,
    ) -> Self {
        Self {
            description: description.into(),
            driver_path: driver_path.into(),
            driver_hwmon: None,
            sensor_type,
        }
    }

    /// Set the attribute file prefix.
    pub fn with_driver_hwmon(mut self, driver_hwmon: impl Into<String>) -> Self {
        self.driver_hwmon = Some(driver_hwmon.into());
        self
    }

    /// Values for [`descriptors::SENSOR_LABELS`].
    pub fn labels(&self) -> [String; 3] {
        [
            self.driver_path.display().to_string(),
            self.driver_hwmon.clone().unwrap_or_default(),
            self.description.clone(),
        ]
    }
}

/// Sensor list file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorList {
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

fn default_sensor_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_SENSOR_FILE))
}

/// Configuration for the sysfs hardware-monitor source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HwmonConfig {
    /// Enable this collector (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Sensor list file, used when `sensors` is empty (default: hwmon.yml).
    #[serde(default = "default_sensor_file")]
    pub config: Option<PathBuf>,
    /// Inline sensor list.
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

impl Default for HwmonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            config: default_sensor_file(),
            sensors: Vec::new(),
        }
    }
}

impl HwmonConfig {
    /// Set the sensor list file.
    pub fn with_config(mut self, path: impl AsRef<Path>) -> Self {
        self.config = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set inline sensors.
    pub fn with_sensors(mut self, sensors: Vec<SensorConfig>) -> Self {
        self.sensors = sensors;
        self
    }

    /// Set enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Source reading the configured hwmon sensors from sysfs.
#[derive(Debug)]
pub struct HwmonSource {
    sensors: Vec<SensorConfig>,
}

impl HwmonSource {
    /// Create a source for the given sensors.
    pub fn new(sensors: Vec<SensorConfig>) -> Self {
        Self { sensors }
    }

    /// Configured sensors.
    pub fn sensors(&self) -> &[SensorConfig] {
        &self.sensors
    }
}

#[async_trait::async_trait]
impl Source for HwmonSource {
    fn name(&self) -> &str {
        NAME
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        descriptors::metrics().sysfs()
    }

    async fn poll(&self, emitter: &Emitter) {
        let start = Instant::now();
        let mut emitted = 0usize;

        for sensor in &self.sensors {
            for attribute in attributes(sensor.sensor_type) {
                if let Some(sample) = attribute.read(sensor).await {
                    emitter.emit(sample).await;
                    emitted += 1;
                }
            }
        }

        tracing::debug!(
            sensors = self.sensors.len(),
            samples = emitted,
            elapsed_ms = start.elapsed().as_millis(),
            "hwmon poll finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::PollEvent;
    use crate::metric::Sample;
    use tokio::sync::mpsc;

    async fn collect(source: &HwmonSource) -> (Vec<Sample>, usize) {
        let (tx, mut rx) = mpsc::channel(256);
        let emitter = Emitter::new(NAME, tx);
        source.poll(&emitter).await;
        drop(emitter);

        let mut samples = Vec::new();
        let mut errors = 0;
        while let Some(event) = rx.recv().await {
            match event {
                PollEvent::Sample(s) => samples.push(s),
                PollEvent::Error { .. } => errors += 1,
                PollEvent::Done { .. } => {}
            }
        }
        (samples, errors)
    }

    fn find<'a>(samples: &'a [Sample], name: &str) -> Option<&'a Sample> {
        samples.iter().find(|s| s.descriptor().name() == name)
    }

    #[tokio::test]
    async fn test_temperature_sensor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("temp1_input"), "45500\n").unwrap();
        std::fs::write(dir.path().join("temp1_max"), "80000\n").unwrap();
        std::fs::write(dir.path().join("temp1_type"), "4\n").unwrap();
        std::fs::write(dir.path().join("temp1_label"), "Board Temp\n").unwrap();
        std::fs::write(dir.path().join("temp1_crit"), "garbage\n").unwrap();

        let sensor = SensorConfig::new("Board", dir.path(), SensorType::Temp)
            .with_driver_hwmon("temp1");
        let (samples, errors) = collect(&HwmonSource::new(vec![sensor])).await;

        assert_eq!(errors, 0);
        assert_eq!(samples.len(), 4);

        let input = find(&samples, "hwmon_temperature_celsius").unwrap();
        assert_eq!(input.value(), 45.5);
        assert_eq!(input.label("hw_mon"), Some("temp1"));
        assert_eq!(input.label("description"), Some("Board"));
        assert_eq!(
            input.label("driver_path"),
            Some(dir.path().display().to_string().as_str())
        );

        assert_eq!(find(&samples, "hwmon_temperature_max_celsius").unwrap().value(), 80.0);

        let kind = find(&samples, "hwmon_temperature_sensor_type_selection_info").unwrap();
        assert_eq!(kind.value(), 1.0);
        assert_eq!(kind.label("sensor_type"), Some("thermistor"));

        let label = find(&samples, "hwmon_temperature_label_info").unwrap();
        assert_eq!(label.label("channel"), Some("Board Temp"));

        assert!(find(&samples, "hwmon_temperature_critical_max_celsius").is_none());
    }

    #[tokio::test]
    async fn test_fan_and_voltage_divisors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fan1_input"), "12000\n").unwrap();
        std::fs::write(dir.path().join("fan1_enable"), "1\n").unwrap();
        std::fs::write(dir.path().join("in0_input"), "3312\n").unwrap();
        std::fs::write(dir.path().join("in0_crit"), "3600\n").unwrap();

        let sensors = vec![
            SensorConfig::new("Fan 1", dir.path(), SensorType::Fan).with_driver_hwmon("fan1"),
            SensorConfig::new("3.3V", dir.path(), SensorType::Voltage).with_driver_hwmon("in0"),
        ];
        let (samples, _) = collect(&HwmonSource::new(sensors)).await;

        assert_eq!(find(&samples, "hwmon_fan_rpm").unwrap().value(), 12000.0);
        assert_eq!(
            find(&samples, "hwmon_fan_sensor_enabled_bool").unwrap().value(),
            1.0
        );
        assert_eq!(find(&samples, "hwmon_voltage_volts").unwrap().value(), 3.312);
        assert_eq!(
            find(&samples, "hwmon_voltage_critical_max_volts").unwrap().value(),
            3.6
        );
    }

    #[tokio::test]
    async fn test_raw_sensor_reads_driver_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psu_fan_speed");
        std::fs::write(&path, "7\n").unwrap();

        let sensor = SensorConfig::new("PSU fan", &path, SensorType::Raw);
        let (samples, _) = collect(&HwmonSource::new(vec![sensor])).await;

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].descriptor().name(), "hwmon_raw_sensor_reading");
        assert_eq!(samples[0].value(), 7.0);
        assert_eq!(
            samples[0].label("path"),
            Some(path.display().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_missing_sensor_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let sensor = SensorConfig::new("Gone", dir.path().join("absent"), SensorType::Current)
            .with_driver_hwmon("curr1");
        let (samples, errors) = collect(&HwmonSource::new(vec![sensor])).await;

        assert!(samples.is_empty());
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_sensor_list_yaml() {
        let yaml = r#"
sensors:
  - description: CPU core
    driver_path: /sys/class/hwmon/hwmon0
    driver_hwmon: temp2
    type: temp
  - description: PSU1 fan
    driver_path: /sys/bus/i2c/devices/0-0030/fan1
    type: raw
"#;
        let list: SensorList = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(list.sensors.len(), 2);
        assert_eq!(list.sensors[0].sensor_type, SensorType::Temp);
        assert_eq!(list.sensors[0].driver_hwmon.as_deref(), Some("temp2"));
        assert_eq!(list.sensors[1].sensor_type, SensorType::Raw);
        assert!(list.sensors[1].driver_hwmon.is_none());
    }

    #[test]
    fn test_unknown_sensor_type_rejected() {
        let yaml = "description: x\ndriver_path: /x\ntype: humidity\n";
        assert!(serde_yaml::from_str::<SensorConfig>(yaml).is_err());
    }

    #[test]
    fn test_sensor_type_strings() {
        assert_eq!(SensorType::Temp.to_string(), "temp");
        assert_eq!("voltage".parse::<SensorType>().unwrap(), SensorType::Voltage);
    }
}
