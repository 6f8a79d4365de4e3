//! Descriptor set shared by the sysfs and smonctl hardware-monitor sources.

use std::sync::{Arc, OnceLock};

use crate::metric::MetricDescriptor;

/// Prefix of every hardware-monitor metric name.
pub const PREFIX: &str = "hwmon_";

/// Labels identifying one sensor.
pub const SENSOR_LABELS: [&str; 3] = ["driver_path", "hw_mon", "description"];

const SENSOR_ENABLED_HELP: &str = "1 = sensor enabled, 0 = sensor disabled";

/// Every hardware-monitor descriptor, created once per process.
#[derive(Debug)]
pub struct HwmonMetrics {
    pub voltage_min: Arc<MetricDescriptor>,
    pub voltage_critical_min: Arc<MetricDescriptor>,
    pub voltage_max: Arc<MetricDescriptor>,
    pub voltage_critical_max: Arc<MetricDescriptor>,
    pub voltage: Arc<MetricDescriptor>,
    pub voltage_info: Arc<MetricDescriptor>,
    pub voltage_enabled: Arc<MetricDescriptor>,

    pub fan_min: Arc<MetricDescriptor>,
    pub fan_max: Arc<MetricDescriptor>,
    pub fan: Arc<MetricDescriptor>,
    pub fan_divisor: Arc<MetricDescriptor>,
    pub fan_pulses: Arc<MetricDescriptor>,
    pub fan_target: Arc<MetricDescriptor>,
    pub fan_info: Arc<MetricDescriptor>,
    pub fan_enabled: Arc<MetricDescriptor>,

    pub temperature_type: Arc<MetricDescriptor>,
    pub temperature_max: Arc<MetricDescriptor>,
    pub temperature_min: Arc<MetricDescriptor>,
    pub temperature_max_hysteresis: Arc<MetricDescriptor>,
    pub temperature_min_hysteresis: Arc<MetricDescriptor>,
    pub temperature: Arc<MetricDescriptor>,
    pub temperature_critical_max: Arc<MetricDescriptor>,
    pub temperature_critical_max_hysteresis: Arc<MetricDescriptor>,
    pub temperature_emergency_max: Arc<MetricDescriptor>,
    pub temperature_emergency_max_hysteresis: Arc<MetricDescriptor>,
    pub temperature_critical_min: Arc<MetricDescriptor>,
    pub temperature_critical_min_hysteresis: Arc<MetricDescriptor>,
    pub temperature_offset: Arc<MetricDescriptor>,
    pub temperature_label: Arc<MetricDescriptor>,
    pub temperature_enabled: Arc<MetricDescriptor>,

    pub current_max: Arc<MetricDescriptor>,
    pub current_min: Arc<MetricDescriptor>,
    pub current_critical_min: Arc<MetricDescriptor>,
    pub current_critical_max: Arc<MetricDescriptor>,
    pub current: Arc<MetricDescriptor>,
    pub current_enabled: Arc<MetricDescriptor>,

    pub power_watts: Arc<MetricDescriptor>,
    pub power_present: Arc<MetricDescriptor>,
    pub power_state: Arc<MetricDescriptor>,
    pub power_prev_state: Arc<MetricDescriptor>,

    pub raw: Arc<MetricDescriptor>,
}

fn sensor(name: &str, help: &str) -> Arc<MetricDescriptor> {
    MetricDescriptor::gauge(format!("{PREFIX}{name}"), help, SENSOR_LABELS)
}

fn with_label(name: &str, help: &str, label: &str) -> Arc<MetricDescriptor> {
    let labels = SENSOR_LABELS.iter().copied().chain([label]);
    MetricDescriptor::gauge(format!("{PREFIX}{name}"), help, labels)
}

impl HwmonMetrics {
    fn new() -> Self {
        Self {
            voltage_min: sensor("voltage_min_volts", "Voltage min value. Unit: Volts"),
            voltage_critical_min: sensor(
                "voltage_critical_min_volts",
                "Voltage critical min value. Unit: Volts",
            ),
            voltage_max: sensor("voltage_max_volts", "Voltage max value. Unit: Volts"),
            voltage_critical_max: sensor(
                "voltage_critical_max_volts",
                "Voltage critical max value. Unit: Volts",
            ),
            voltage: sensor("voltage_volts", "Voltage input value. Unit: Volts"),
            voltage_info: with_label(
                "voltage_info",
                "Suggested voltage channel label.",
                "channel",
            ),
            voltage_enabled: sensor("voltage_sensor_enabled_bool", SENSOR_ENABLED_HELP),

            fan_min: sensor("fan_min_rpm", "Fan minimum value. Unit: revolution/min"),
            fan_max: sensor("fan_max_rpm", "Fan maximum value. Unit: revolution/min"),
            fan: sensor("fan_rpm", "Fan input value. Unit: revolution/min"),
            fan_divisor: sensor(
                "fan_divisor",
                "Fan divisor. Integer value in powers of 2 (1, 2, 4, 8, 16, 32, 64, 128).",
            ),
            fan_pulses: sensor(
                "fan_pulses",
                "Number of tachometer pulses per fan revolution",
            ),
            fan_target: sensor("fan_target_rpm", "Desired fan speed. Unit: revolution/min"),
            fan_info: with_label("fan_info", "Suggested fan channel label", "channel"),
            fan_enabled: sensor("fan_sensor_enabled_bool", SENSOR_ENABLED_HELP),

            temperature_type: with_label(
                "temperature_sensor_type_selection_info",
                "Sensor type selection.",
                "sensor_type",
            ),
            temperature_max: sensor(
                "temperature_max_celsius",
                "Temperature max value. Unit: degree Celsius",
            ),
            temperature_min: sensor(
                "temperature_min_celsius",
                "Temperature min value. Unit: degree Celsius",
            ),
            temperature_max_hysteresis: sensor(
                "temperature_max_hysteresis_celsius",
                "Temperature hysteresis value for max limit. Unit: degree Celsius",
            ),
            temperature_min_hysteresis: sensor(
                "temperature_min_hysteresis_celsius",
                "Temperature hysteresis value for min limit. Unit: degree Celsius",
            ),
            temperature: sensor(
                "temperature_celsius",
                "Temperature input value. Unit: degree Celsius",
            ),
            temperature_critical_max: sensor(
                "temperature_critical_max_celsius",
                "Temperature critical max value, typically greater than corresponding temp_max values. Unit: degree Celsius",
            ),
            temperature_critical_max_hysteresis: sensor(
                "temperature_critical_max_hysteresis_celsius",
                "Temperature hysteresis value for critical limit. Unit: degree Celsius",
            ),
            temperature_emergency_max: sensor(
                "temperature_emergency_max_celsius",
                "Temperature emergency max value, for chips supporting more than two upper temperature limits. Unit: degree Celsius",
            ),
            temperature_emergency_max_hysteresis: sensor(
                "temperature_emergency_max_hysteresis_celsius",
                "Temperature hysteresis value for emergency limit. Unit: degree Celsius",
            ),
            temperature_critical_min: sensor(
                "temperature_critical_min_celsius",
                "Temperature critical min value, typically lower than corresponding temp_min values. Unit: degree Celsius",
            ),
            temperature_critical_min_hysteresis: sensor(
                "temperature_critical_min_hysteresis_celsius",
                "Temperature hysteresis value for critical min limit. Unit: degree Celsius",
            ),
            temperature_offset: sensor(
                "temperature_offset_celsius",
                "Temperature offset which is added to the temperature reading by the chip. Unit: degree Celsius",
            ),
            temperature_label: with_label(
                "temperature_label_info",
                "Suggested temperature channel label",
                "channel",
            ),
            temperature_enabled: sensor("temperature_sensor_enabled_bool", SENSOR_ENABLED_HELP),

            current_max: sensor("current_max_ampere", "Current max value. Unit: Ampere"),
            current_min: sensor("current_min_ampere", "Current min value. Unit: Ampere"),
            current_critical_min: sensor(
                "current_critical_min_ampere",
                "Current critical low value. Unit: Ampere",
            ),
            current_critical_max: sensor(
                "current_critical_max_ampere",
                "Current critical high value. Unit: Ampere",
            ),
            current: sensor("current_ampere", "Current input value. Unit: Ampere"),
            current_enabled: sensor("current_sensor_enabled_bool", SENSOR_ENABLED_HELP),

            power_watts: sensor("power_watts", "Power supply output. Unit: Watts"),
            power_present: sensor(
                "power_present_bool",
                "1 = power supply present, 0 = power supply absent",
            ),
            power_state: sensor(
                "power_state",
                "Power supply state. 1 = OK, 0 = BAD, -1 = POWERED OFF, -2 = NOT DETECTED",
            ),
            power_prev_state: sensor(
                "power_prev_state",
                "Previous power supply state. 1 = OK, 0 = BAD, -1 = POWERED OFF, -2 = NOT DETECTED",
            ),

            raw: MetricDescriptor::gauge(
                format!("{PREFIX}raw_sensor_reading"),
                "Arbitrary sensor reading, see labels on how to interpret this value",
                ["path", "description"],
            ),
        }
    }

    fn voltage_family(&self) -> [&Arc<MetricDescriptor>; 7] {
        [
            &self.voltage_min,
            &self.voltage_critical_min,
            &self.voltage_max,
            &self.voltage_critical_max,
            &self.voltage,
            &self.voltage_info,
            &self.voltage_enabled,
        ]
    }

    fn fan_family(&self) -> [&Arc<MetricDescriptor>; 8] {
        [
            &self.fan_min,
            &self.fan_max,
            &self.fan,
            &self.fan_divisor,
            &self.fan_pulses,
            &self.fan_target,
            &self.fan_info,
            &self.fan_enabled,
        ]
    }

    fn temperature_family(&self) -> [&Arc<MetricDescriptor>; 15] {
        [
            &self.temperature_type,
            &self.temperature_max,
            &self.temperature_min,
            &self.temperature_max_hysteresis,
            &self.temperature_min_hysteresis,
            &self.temperature,
            &self.temperature_critical_max,
            &self.temperature_critical_max_hysteresis,
            &self.temperature_emergency_max,
            &self.temperature_emergency_max_hysteresis,
            &self.temperature_critical_min,
            &self.temperature_critical_min_hysteresis,
            &self.temperature_offset,
            &self.temperature_label,
            &self.temperature_enabled,
        ]
    }

    fn current_family(&self) -> [&Arc<MetricDescriptor>; 6] {
        [
            &self.current_max,
            &self.current_min,
            &self.current_critical_min,
            &self.current_critical_max,
            &self.current,
            &self.current_enabled,
        ]
    }

    fn power_family(&self) -> [&Arc<MetricDescriptor>; 4] {
        [
            &self.power_watts,
            &self.power_present,
            &self.power_state,
            &self.power_prev_state,
        ]
    }

    /// Descriptors the sysfs source may emit.
    pub fn sysfs(&self) -> Vec<Arc<MetricDescriptor>> {
        self.voltage_family()
            .into_iter()
            .chain(self.fan_family())
            .chain(self.temperature_family())
            .chain(self.current_family())
            .chain([&self.raw])
            .map(Arc::clone)
            .collect()
    }

    /// Descriptors the smonctl source may emit.
    ///
    /// smonctl reports values only, so the channel label, sensor type and
    /// enable flags never appear.
    pub fn smonctl(&self) -> Vec<Arc<MetricDescriptor>> {
        let skipped = [
            &self.voltage_info,
            &self.voltage_enabled,
            &self.fan_divisor,
            &self.fan_info,
            &self.fan_enabled,
            &self.temperature_type,
            &self.temperature_label,
            &self.temperature_enabled,
            &self.current_enabled,
        ];
        self.voltage_family()
            .into_iter()
            .chain(self.fan_family())
            .chain(self.temperature_family())
            .chain(self.current_family())
            .chain(self.power_family())
            .chain([&self.raw])
            .filter(|d| !skipped.iter().any(|s| Arc::ptr_eq(*s, *d)))
            .map(Arc::clone)
            .collect()
    }
}

/// Shared hardware-monitor descriptors.
pub fn metrics() -> &'static HwmonMetrics {
    static METRICS: OnceLock<HwmonMetrics> = OnceLock::new();
    METRICS.get_or_init(HwmonMetrics::new)
}
