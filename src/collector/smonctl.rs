//! Hardware-monitor sensors reported by the `smonctl` diagnostic command.
//!
//! An alternative to [`HwmonSource`](crate::collector::hwmon::HwmonSource)
//! for platforms where smonctl already knows the sensor layout. Samples use
//! the same descriptor set, plus the power supply families.

pub mod sensor;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::collector::hwmon::descriptors;
use crate::collector::{Emitter, Source, SourceError};
use crate::metric::MetricDescriptor;
use crate::util::run_tool;

pub use sensor::{RecordError, Sensor, SensorBody, SensorHeader, decode};

/// Source name used in logs and error reports.
pub const NAME: &str = "SmonctlCollector";

/// Default smonctl binary.
pub const DEFAULT_PATH: &str = "/usr/sbin/smonctl";

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_PATH)
}

fn default_args() -> Vec<String> {
    vec!["-j".to_string()]
}

/// Configuration for the smonctl source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmonctlConfig {
    /// Enable this collector (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// smonctl binary.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Arguments producing the JSON sensor array (default: -j).
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl Default for SmonctlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_path(),
            args: default_args(),
        }
    }
}

impl SmonctlConfig {
    /// Set the binary path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Source running smonctl and decoding its sensor records.
#[derive(Debug)]
pub struct SmonctlSource {
    config: SmonctlConfig,
}

impl SmonctlSource {
    pub fn new(config: SmonctlConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Source for SmonctlSource {
    fn name(&self) -> &str {
        NAME
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        descriptors::metrics().smonctl()
    }

    async fn poll(&self, emitter: &Emitter) {
        let start = Instant::now();

        let output = match run_tool(&self.config.path, &self.config.args).await {
            Ok(output) => output,
            Err(e) => {
                emitter.report(e).await;
                return;
            }
        };

        let records = match decode(&output) {
            Ok(records) => records,
            Err(e) => {
                emitter.report(SourceError::decode("smonctl output", e)).await;
                return;
            }
        };

        let mut emitted = 0usize;
        for record in &records {
            match record {
                Ok(sensor) => {
                    for sample in sensor.samples() {
                        emitter.emit(sample).await;
                        emitted += 1;
                    }
                }
                Err(e) => emitter.report(SourceError::decode("smonctl record", e)).await,
            }
        }

        tracing::debug!(
            records = records.len(),
            samples = emitted,
            elapsed_ms = start.elapsed().as_millis(),
            "smonctl poll finished"
        );
    }
}
