//! Per-family sysfs attribute parsers.
//!
//! Each sensor type maps to a fixed list of attributes. An attribute names a
//! file suffix below `<driver_path>/<driver_hwmon>` and how its content turns
//! into a sample. Attributes whose file is absent or unparsable are skipped.

use std::path::PathBuf;
use std::sync::Arc;

use super::descriptors::{HwmonMetrics, metrics};
use super::{SensorConfig, SensorType};
use crate::metric::{MetricDescriptor, Sample};
use crate::util::{read_f64, read_string};

/// Millidegrees, millivolts and milliamperes.
const MILLI: f64 = 1000.0;

/// How one sysfs attribute is read and emitted.
#[derive(Debug, Clone, Copy)]
pub enum Attribute {
    /// Numeric file, divided by `divisor`.
    Value {
        descriptor: &'static Arc<MetricDescriptor>,
        suffix: &'static str,
        divisor: f64,
    },
    /// Text file, emitted as value 1 with the text as `channel` label.
    Label {
        descriptor: &'static Arc<MetricDescriptor>,
        suffix: &'static str,
    },
    /// Numeric temperature sensor type code, emitted as value 1 with its name.
    SensorType {
        descriptor: &'static Arc<MetricDescriptor>,
        suffix: &'static str,
    },
    /// The driver path itself holds the value.
    Raw {
        descriptor: &'static Arc<MetricDescriptor>,
    },
}

fn value(
    descriptor: &'static Arc<MetricDescriptor>,
    suffix: &'static str,
    divisor: f64,
) -> Attribute {
    Attribute::Value {
        descriptor,
        suffix,
        divisor,
    }
}

fn label(descriptor: &'static Arc<MetricDescriptor>, suffix: &'static str) -> Attribute {
    Attribute::Label { descriptor, suffix }
}

fn voltage(m: &'static HwmonMetrics) -> Vec<Attribute> {
    vec![
        value(&m.voltage_min, "_min", MILLI),
        value(&m.voltage_critical_min, "_lcrit", MILLI),
        value(&m.voltage_max, "_max", MILLI),
        value(&m.voltage_critical_max, "_crit", MILLI),
        value(&m.voltage, "_input", MILLI),
        label(&m.voltage_info, "_label"),
        value(&m.voltage_enabled, "_enable", 1.0),
    ]
}

fn fan(m: &'static HwmonMetrics) -> Vec<Attribute> {
    vec![
        value(&m.fan_min, "_min", 1.0),
        value(&m.fan_max, "_max", 1.0),
        value(&m.fan, "_input", 1.0),
        value(&m.fan_divisor, "_div", 1.0),
        value(&m.fan_pulses, "_pulses", 1.0),
        value(&m.fan_target, "_target", 1.0),
        label(&m.fan_info, "_label"),
        value(&m.fan_enabled, "_enable", 1.0),
    ]
}

fn temperature(m: &'static HwmonMetrics) -> Vec<Attribute> {
    vec![
        Attribute::SensorType {
            descriptor: &m.temperature_type,
            suffix: "_type",
        },
        value(&m.temperature_max, "_max", MILLI),
        value(&m.temperature_min, "_min", MILLI),
        value(&m.temperature_max_hysteresis, "_max_hyst", MILLI),
        value(&m.temperature_min_hysteresis, "_min_hyst", MILLI),
        value(&m.temperature, "_input", MILLI),
        value(&m.temperature_critical_max, "_crit", MILLI),
        value(&m.temperature_critical_max_hysteresis, "_crit_hyst", MILLI),
        value(&m.temperature_emergency_max, "_emergency", MILLI),
        value(&m.temperature_emergency_max_hysteresis, "_emergency_hyst", MILLI),
        value(&m.temperature_critical_min, "_lcrit", MILLI),
        value(&m.temperature_critical_min_hysteresis, "_lcrit_hyst", MILLI),
        value(&m.temperature_offset, "_offset", MILLI),
        label(&m.temperature_label, "_label"),
        value(&m.temperature_enabled, "_enable", 1.0),
    ]
}

fn current(m: &'static HwmonMetrics) -> Vec<Attribute> {
    vec![
        value(&m.current_max, "_max", MILLI),
        value(&m.current_min, "_min", MILLI),
        value(&m.current_critical_min, "_lcrit", MILLI),
        value(&m.current_critical_max, "_crit", MILLI),
        value(&m.current, "_input", MILLI),
        value(&m.current_enabled, "_enable", 1.0),
    ]
}

/// Attributes read for a sensor of the given type.
pub fn attributes(sensor_type: SensorType) -> Vec<Attribute> {
    let m = metrics();
    match sensor_type {
        SensorType::Voltage => voltage(m),
        SensorType::Fan => fan(m),
        SensorType::Temp => temperature(m),
        SensorType::Current => current(m),
        SensorType::Raw => vec![Attribute::Raw { descriptor: &m.raw }],
    }
}

/// Name of a temperature sensor type code.
pub fn temperature_sensor_type(code: f64) -> &'static str {
    match code as i64 {
        1 => "CPU embedded diode",
        2 => "3904 transistor",
        3 => "thermal diode",
        4 => "thermistor",
        5 => "AMD AMDSI",
        6 => "Intel PECI",
        _ => "",
    }
}

impl Attribute {
    fn file(sensor: &SensorConfig, suffix: &str) -> PathBuf {
        let hwmon = sensor.driver_hwmon.as_deref().unwrap_or_default();
        sensor.driver_path.join(format!("{hwmon}{suffix}"))
    }

    /// Read the attribute for `sensor`, or `None` if it is absent.
    pub async fn read(&self, sensor: &SensorConfig) -> Option<Sample> {
        let labels = sensor.labels();
        match *self {
            Self::Value {
                descriptor,
                suffix,
                divisor,
            } => {
                let value = read_optional(Self::file(sensor, suffix)).await?;
                Some(Sample::new(descriptor, value / divisor, labels))
            }
            Self::Label { descriptor, suffix } => {
                let path = Self::file(sensor, suffix);
                let text = read_string(&path).await.ok()?;
                let labels = labels.into_iter().chain([text]);
                Some(Sample::new(descriptor, 1.0, labels))
            }
            Self::SensorType { descriptor, suffix } => {
                let code = read_optional(Self::file(sensor, suffix)).await?;
                let labels = labels
                    .into_iter()
                    .chain([temperature_sensor_type(code).to_string()]);
                Some(Sample::new(descriptor, 1.0, labels))
            }
            Self::Raw { descriptor } => {
                let value = read_optional(sensor.driver_path.clone()).await?;
                let labels = [
                    sensor.driver_path.display().to_string(),
                    sensor.description.clone(),
                ];
                Some(Sample::new(descriptor, value, labels))
            }
        }
    }
}

async fn read_optional(path: PathBuf) -> Option<f64> {
    match read_f64(path).await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::trace!(error = %e, "Skipping sensor attribute");
            None
        }
    }
}
