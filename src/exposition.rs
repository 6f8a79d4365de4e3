//! Prometheus text exposition of one poll cycle.
//!
//! Every scrape builds a fresh [`prometheus::Registry`] holding one
//! [`GaugeVec`] per descriptor that produced samples, so nothing from a
//! previous cycle can leak into the next one.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::collector::PollResult;
use crate::metric::MetricDescriptor;

/// Per-source error count of the current scrape.
pub const SCRAPE_ERRORS_METRIC: &str = "cumulus_exporter_scrape_errors";

/// Content type of the text format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Failure turning a poll result into text.
#[derive(Debug, Error)]
pub enum ExpositionError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("encoded exposition is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

struct Family {
    descriptor: Arc<MetricDescriptor>,
    gauges: GaugeVec,
}

impl Family {
    fn new(descriptor: &Arc<MetricDescriptor>) -> Result<Self, prometheus::Error> {
        let labels: Vec<&str> = descriptor.labels().iter().map(String::as_str).collect();
        let gauges = GaugeVec::new(Opts::new(descriptor.name(), descriptor.help()), &labels)?;
        Ok(Self {
            descriptor: Arc::clone(descriptor),
            gauges,
        })
    }
}

/// Encode `result` in the Prometheus text format.
///
/// `sources` lists every registered source so the error gauge reports an
/// explicit zero for sources that had a clean cycle. A sample that does not
/// fit its family is dropped with a warning; the scrape itself still succeeds.
pub fn encode(result: &PollResult, sources: &[&str]) -> Result<String, ExpositionError> {
    let registry = Registry::new();
    let mut families: BTreeMap<&str, Family> = BTreeMap::new();

    for sample in &result.samples {
        let descriptor = sample.descriptor();
        let family = match families.entry(descriptor.name()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let family = Family::new(descriptor)?;
                registry.register(Box::new(family.gauges.clone()))?;
                entry.insert(family)
            }
        };

        if family.descriptor.labels() != descriptor.labels() {
            tracing::warn!(
                metric = %descriptor.name(),
                "Dropping sample whose labels differ from its family"
            );
            continue;
        }

        let values: Vec<&str> = sample.label_values().iter().map(String::as_str).collect();
        match family.gauges.get_metric_with_label_values(&values) {
            Ok(gauge) => gauge.set(sample.value()),
            Err(e) => {
                tracing::warn!(metric = %descriptor.name(), error = %e, "Dropping sample");
            }
        }
    }

    let scrape_errors = GaugeVec::new(
        Opts::new(
            SCRAPE_ERRORS_METRIC,
            "Number of errors reported by each source during this scrape",
        ),
        &["source"],
    )?;
    for source in sources {
        scrape_errors
            .with_label_values(&[*source])
            .set(result.error_count(source) as f64);
    }
    for error in &result.errors {
        scrape_errors
            .with_label_values(&[&*error.source])
            .set(result.error_count(&error.source) as f64);
    }
    registry.register(Box::new(scrape_errors))?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
