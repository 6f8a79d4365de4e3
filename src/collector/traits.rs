//! Core source trait and the per-poll event channel.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::guard::ReadError;
use crate::metric::{MetricDescriptor, Sample};
use crate::util::ToolError;

/// Errors a source reports while polling.
///
/// None of these abort sibling sources; most do not even abort the rest of
/// the reporting source's poll.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A counter or sensor file could not be read.
    #[error(transparent)]
    Resource(#[from] ReadError),

    /// A hardware mode could not be read; the generic schema is used instead.
    #[error("could not retrieve {which} mode: {source}")]
    Mode {
        which: &'static str,
        #[source]
        source: ReadError,
    },

    /// A diagnostic command failed to run or exited unsuccessfully.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Tool output or a record in it could not be decoded.
    #[error("could not decode {context}: {message}")]
    Decode { context: String, message: String },

    /// Entities to poll could not be listed.
    #[error("could not enumerate {what}: {source}")]
    Enumerate {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// The poll did not finish before its deadline.
    #[error("poll did not complete within {deadline:?}")]
    Timeout { deadline: Duration },

    /// The poll task panicked.
    #[error("poll task panicked: {0}")]
    Panicked(String),
}

impl SourceError {
    /// Build a decode error from anything displayable.
    pub fn decode(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// One item on a poll cycle's merged event channel.
#[derive(Debug)]
pub enum PollEvent {
    /// A successfully obtained sample.
    Sample(Sample),
    /// An error reported by the named source.
    Error { source: Arc<str>, error: SourceError },
    /// The named source finished polling. Sent exactly once per source.
    Done { source: Arc<str>, elapsed: Duration },
}

/// Handle a source uses to hand samples and errors to the orchestrator.
///
/// Sends wait for channel capacity, which is safe because the orchestrator
/// drains samples and errors from the same channel.
#[derive(Debug, Clone)]
pub struct Emitter {
    source: Arc<str>,
    tx: mpsc::Sender<PollEvent>,
}

impl Emitter {
    /// Emitter tagging every report with `source`.
    pub fn new(source: impl Into<Arc<str>>, tx: mpsc::Sender<PollEvent>) -> Self {
        Self {
            source: source.into(),
            tx,
        }
    }

    /// Name of the source this emitter belongs to.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Hand a sample to the orchestrator.
    pub async fn emit(&self, sample: Sample) {
        self.send(PollEvent::Sample(sample)).await;
    }

    /// Report an error to the orchestrator.
    pub async fn report(&self, error: impl Into<SourceError>) {
        let event = PollEvent::Error {
            source: Arc::clone(&self.source),
            error: error.into(),
        };
        self.send(event).await;
    }

    /// Signal completion. Consumes the emitter so it can only happen once.
    pub(crate) async fn done(self, elapsed: Duration) {
        let event = PollEvent::Done {
            source: Arc::clone(&self.source),
            elapsed,
        };
        self.send(event).await;
    }

    async fn send(&self, event: PollEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::warn!(source = %self.source, "Poll receiver dropped, discarding event");
        }
    }
}

/// A pollable data source.
///
/// Sources are constructed once at startup and polled once per scrape. They
/// keep no state between polls. `poll` streams samples and errors through the
/// [`Emitter`]; completion is signalled by the orchestrator when the returned
/// future resolves, so every source signals exactly once.
#[async_trait::async_trait]
pub trait Source: Send + Sync + 'static {
    /// Stable source name used in logs and error reports.
    fn name(&self) -> &str;

    /// Every descriptor this source may emit, including variants that are
    /// only selected under some hardware modes.
    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>>;

    /// Perform one poll cycle.
    async fn poll(&self, emitter: &Emitter);
}
