//! smonctl JSON sensor records.
//!
//! smonctl prints an array of heterogeneous objects discriminated by `type`.
//! Decoding runs in two passes: the common header first, then the
//! type-specific body. Numeric fields arrive as numbers or as numeric strings
//! depending on the platform driver, and both are accepted.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::collector::hwmon::descriptors::{HwmonMetrics, metrics};
use crate::metric::{MetricDescriptor, Sample, bool_to_f64};

/// A record that could not be turned into a [`Sensor`].
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("sensor record is not a JSON object")]
    NotAnObject,

    #[error("unknown sensor type {kind:?} for {description:?}")]
    UnknownType { kind: String, description: String },

    #[error("invalid {kind} sensor record {description:?}: {source}")]
    Invalid {
        kind: String,
        description: String,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

/// Deserialize an optional number that may be encoded as a string.
pub fn opt_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Deserialize a string that some platforms report as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lenient variant used when scanning arbitrary keys.
fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fields shared by every record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SensorHeader {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub driver_hwmon: Option<Vec<String>>,
    #[serde(default)]
    pub driver_path: Option<String>,
}

impl SensorHeader {
    /// Sensor name: `name`, else the first `driver_hwmon` entry.
    pub fn name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.driver_hwmon.as_ref()?.first().map(String::as_str))
    }
}

/// Voltage and current records share one shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Limits {
    #[serde(default, deserialize_with = "opt_float")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub max: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub lcrit: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub crit: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub input: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FanReading {
    #[serde(default, deserialize_with = "opt_float")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub max: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub input: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub pulses: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemperatureReading {
    #[serde(default, deserialize_with = "opt_float")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub max: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub min_hyst: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub max_hyst: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub input: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub lcrit: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub crit: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub lcrit_hyst: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub crit_hyst: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub emergency: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub emergency_hyst: Option<f64>,
    #[serde(default, deserialize_with = "opt_float")]
    pub offset: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawReading {
    #[serde(default, deserialize_with = "opt_float")]
    pub raw: Option<f64>,
}

/// Power supply record.
///
/// Presence and output power live under driver-specific keys such as
/// `psu1_pwr_status`, `psu_pwr2_present` or `psu1_power`, so they are found
/// by scanning the object rather than by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerReading {
    pub state: Option<String>,
    pub prev_state: Option<String>,
    pub present: Option<bool>,
    pub watts: Option<f64>,
}

impl PowerReading {
    fn from_object(object: &serde_json::Map<String, Value>) -> Self {
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let mut reading = Self {
            state: text("state"),
            prev_state: text("prev_state"),
            ..Self::default()
        };

        for (key, value) in object {
            let Some(num) = as_float(value) else {
                continue;
            };
            if key.contains("present") || key.contains("pwr_status") {
                reading.present = Some(num > 0.0);
            } else if key.contains("power") {
                reading.watts = Some(num);
            }
        }
        reading
    }
}

/// Numeric encoding of a power supply state.
pub fn power_state_value(state: &str) -> Option<f64> {
    match state {
        "OK" => Some(1.0),
        "BAD" => Some(0.0),
        "POWERED OFF" => Some(-1.0),
        "NOT DETECTED" => Some(-2.0),
        _ => None,
    }
}

/// Type-specific body of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorBody {
    Voltage(Limits),
    Fan(FanReading),
    Temp(TemperatureReading),
    Current(Limits),
    Power(PowerReading),
    Raw(RawReading),
}

/// A fully decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub header: SensorHeader,
    pub body: SensorBody,
}

fn body<T: serde::de::DeserializeOwned>(
    header: &SensorHeader,
    value: Value,
) -> Result<T, RecordError> {
    serde_json::from_value(value).map_err(|source| RecordError::Invalid {
        kind: header.kind.clone(),
        description: header.description.clone(),
        source,
    })
}

impl Sensor {
    /// Decode one record: header first, then the body selected by `type`.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        if !value.is_object() {
            return Err(RecordError::NotAnObject);
        }
        let header: SensorHeader =
            serde_json::from_value(value.clone()).map_err(|source| RecordError::Invalid {
                kind: "unknown".to_string(),
                description: String::new(),
                source,
            })?;

        let body = match header.kind.as_str() {
            "voltage" => SensorBody::Voltage(body(&header, value)?),
            "fan" => SensorBody::Fan(body(&header, value)?),
            "temp" => SensorBody::Temp(body(&header, value)?),
            "current" => SensorBody::Current(body(&header, value)?),
            "raw" => SensorBody::Raw(body(&header, value)?),
            "power" => SensorBody::Power(
                value
                    .as_object()
                    .map(PowerReading::from_object)
                    .unwrap_or_default(),
            ),
            other => {
                return Err(RecordError::UnknownType {
                    kind: other.to_string(),
                    description: header.description.clone(),
                });
            }
        };

        Ok(Self { header, body })
    }

    /// Samples for every present field. Records without a name yield none.
    pub fn samples(&self) -> Vec<Sample> {
        let Some(name) = self.header.name() else {
            return Vec::new();
        };
        let driver_path = self.header.driver_path.clone().unwrap_or_default();
        let labels = [
            driver_path.clone(),
            name.to_string(),
            self.header.description.clone(),
        ];

        let m = metrics();
        let mut out = Vec::new();
        let mut push = |descriptor: &Arc<MetricDescriptor>, value: Option<f64>| {
            if let Some(value) = value {
                out.push(Sample::new(descriptor, value, labels.clone()));
            }
        };

        match &self.body {
            SensorBody::Voltage(r) => voltage_samples(m, r, &mut push),
            SensorBody::Current(r) => current_samples(m, r, &mut push),
            SensorBody::Fan(r) => {
                push(&m.fan_min, r.min);
                push(&m.fan_max, r.max);
                push(&m.fan, r.input);
                push(&m.fan_pulses, r.pulses);
                push(&m.fan_target, r.target);
            }
            SensorBody::Temp(r) => {
                push(&m.temperature_min, r.min);
                push(&m.temperature_max, r.max);
                push(&m.temperature_min_hysteresis, r.min_hyst);
                push(&m.temperature_max_hysteresis, r.max_hyst);
                push(&m.temperature, r.input);
                push(&m.temperature_critical_min, r.lcrit);
                push(&m.temperature_critical_max, r.crit);
                push(&m.temperature_critical_min_hysteresis, r.lcrit_hyst);
                push(&m.temperature_critical_max_hysteresis, r.crit_hyst);
                push(&m.temperature_emergency_max, r.emergency);
                push(&m.temperature_emergency_max_hysteresis, r.emergency_hyst);
                push(&m.temperature_offset, r.offset);
            }
            SensorBody::Power(r) => {
                push(&m.power_watts, r.watts);
                push(&m.power_present, r.present.map(bool_to_f64));
                push(
                    &m.power_state,
                    r.state.as_deref().and_then(power_state_value),
                );
                push(
                    &m.power_prev_state,
                    r.prev_state.as_deref().and_then(power_state_value),
                );
            }
            SensorBody::Raw(r) => {
                if let Some(value) = r.raw {
                    let path = if driver_path.is_empty() {
                        name.to_string()
                    } else {
                        driver_path
                    };
                    out.push(Sample::new(
                        &m.raw,
                        value,
                        [path, self.header.description.clone()],
                    ));
                }
            }
        }
        out
    }
}

fn voltage_samples(
    m: &HwmonMetrics,
    r: &Limits,
    push: &mut impl FnMut(&Arc<MetricDescriptor>, Option<f64>),
) {
    push(&m.voltage_min, r.min);
    push(&m.voltage_max, r.max);
    push(&m.voltage_critical_min, r.lcrit);
    push(&m.voltage_critical_max, r.crit);
    push(&m.voltage, r.input);
}

fn current_samples(
    m: &HwmonMetrics,
    r: &Limits,
    push: &mut impl FnMut(&Arc<MetricDescriptor>, Option<f64>),
) {
    push(&m.current_min, r.min);
    push(&m.current_max, r.max);
    push(&m.current_critical_min, r.lcrit);
    push(&m.current_critical_max, r.crit);
    push(&m.current, r.input);
}

/// Decode a whole smonctl payload.
///
/// Fails only if the payload is not a JSON array. Individual records that
/// cannot be decoded are returned as errors alongside the good ones.
pub fn decode(data: &[u8]) -> Result<Vec<Result<Sensor, RecordError>>, serde_json::Error> {
    let records: Vec<Value> = serde_json::from_slice(data)?;
    Ok(records.into_iter().map(Sensor::from_value).collect())
}
