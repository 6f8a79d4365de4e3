//! Metric identities and samples.
//!
//! A [`MetricDescriptor`] is created once per process and shared behind an
//! [`Arc`] by every source that may emit it and by the exposition layer.
//! A [`Sample`] is one observation produced during a single poll cycle.

use std::fmt;
use std::sync::Arc;

use strum_macros::{AsRefStr, Display};

/// Value kind of a metric family.
///
/// Every family this exporter produces is a gauge; the kind is still carried
/// on the descriptor so the exposition layer never has to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// Point-in-time value that may go up or down.
    Gauge,
}

/// Immutable identity of a metric family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    name: String,
    help: String,
    labels: Vec<String>,
    kind: ValueKind,
}

impl MetricDescriptor {
    /// Create a shared gauge descriptor.
    pub fn gauge<L, S>(name: impl Into<String>, help: impl Into<String>, labels: L) -> Arc<Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            kind: ValueKind::Gauge,
        })
    }

    /// Fully qualified metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Ordered label names.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Value kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl fmt::Display for MetricDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.name, self.labels.join(","))
    }
}

/// One observation of a metric family.
///
/// Label values match the descriptor's label names positionally.
#[derive(Debug, Clone)]
pub struct Sample {
    descriptor: Arc<MetricDescriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    /// Create a sample.
    ///
    /// Label arity is a programming error, not a runtime condition, so it is
    /// only checked in debug builds.
    pub fn new<L, S>(descriptor: &Arc<MetricDescriptor>, value: f64, label_values: L) -> Self
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label_values: Vec<String> = label_values.into_iter().map(Into::into).collect();
        debug_assert_eq!(
            label_values.len(),
            descriptor.labels().len(),
            "label arity mismatch for {}",
            descriptor.name()
        );
        Self {
            descriptor: Arc::clone(descriptor),
            value,
            label_values,
        }
    }

    /// Descriptor this sample belongs to.
    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.descriptor
    }

    /// Observed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label values, positionally matching [`MetricDescriptor::labels`].
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Look up a label value by label name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .labels()
            .iter()
            .position(|l| l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Map a boolean attribute to a gauge value.
pub fn bool_to_f64(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}
