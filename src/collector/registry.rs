//! Concurrent poll orchestration.
//!
//! Each call to [`Orchestrator::poll_all`] starts one supervisor task per
//! source. The supervisor runs the source's poll in its own task under a
//! deadline and reports `Done` when that task ends, whether it finished,
//! timed out or panicked. All sources write into one bounded channel that
//! the caller drains, so a source reporting many errors can never block on
//! a listener that is busy elsewhere.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::collector::{Emitter, PollEvent, Source, SourceError};
use crate::metric::{MetricDescriptor, Sample};

/// Default per-source poll deadline.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the merged event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// An error together with the source that reported it.
#[derive(Debug)]
pub struct ReportedError {
    /// Source name.
    pub source: Arc<str>,
    /// The reported error.
    pub error: SourceError,
}

/// Merged outcome of one poll cycle.
#[derive(Debug, Default)]
pub struct PollResult {
    /// Every sample obtained, in arrival order.
    pub samples: Vec<Sample>,
    /// Every error reported, in arrival order.
    pub errors: Vec<ReportedError>,
    /// Names of the sources that signalled completion.
    pub completed: Vec<Arc<str>>,
}

impl PollResult {
    /// Number of errors reported by `source`.
    pub fn error_count(&self, source: &str) -> usize {
        self.errors.iter().filter(|e| &*e.source == source).count()
    }
}

/// Runs every enabled source concurrently once per scrape.
pub struct Orchestrator {
    sources: Vec<Arc<dyn Source>>,
    poll_timeout: Duration,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// Create an orchestrator with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Set the per-source poll deadline.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Register a source.
    pub fn register(&mut self, source: impl Source) {
        self.register_shared(Arc::new(source));
    }

    /// Register an already shared source.
    pub fn register_shared(&mut self, source: Arc<dyn Source>) {
        tracing::info!(source = %source.name(), "Collector enabled");
        self.sources.push(source);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_source(mut self, source: impl Source) -> Self {
        self.register(source);
        self
    }

    /// Names of the registered sources.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Per-source poll deadline.
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Union of all sources' descriptors.
    pub fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        self.sources.iter().flat_map(|s| s.descriptors()).collect()
    }

    /// Start a poll cycle and return the merged event stream.
    ///
    /// Every source sends exactly one `Done` event, after all of its samples
    /// and errors. The stream itself only closes once every emitter clone is
    /// dropped, so consumers should count `Done` events instead.
    pub fn spawn_poll(&self) -> mpsc::Receiver<PollEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        for source in &self.sources {
            let emitter = Emitter::new(source.name(), tx.clone());
            tokio::spawn(supervise(Arc::clone(source), emitter, self.poll_timeout));
        }
        rx
    }

    /// Poll every source once and collect the merged result.
    ///
    /// Returns once every source has signalled `Done`.
    pub async fn poll_all(&self) -> PollResult {
        let start = Instant::now();
        let mut rx = self.spawn_poll();
        let mut result = PollResult::default();
        let mut pending = self.sources.len();

        while pending > 0 {
            let Some(event) = rx.recv().await else {
                break;
            };
            match event {
                PollEvent::Sample(sample) => result.samples.push(sample),
                PollEvent::Error { source, error } => {
                    tracing::error!(source = %source, error = %error, "Error running collector");
                    result.errors.push(ReportedError { source, error });
                }
                PollEvent::Done { source, elapsed } => {
                    tracing::debug!(source = %source, elapsed_ms = elapsed.as_millis(), "Collector finished");
                    result.completed.push(source);
                    pending -= 1;
                }
            }
        }

        tracing::debug!(
            sources = self.sources.len(),
            samples = result.samples.len(),
            errors = result.errors.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Poll cycle complete"
        );
        result
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sources", &self.source_names())
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

/// Run one source's poll under a deadline and signal completion.
async fn supervise(source: Arc<dyn Source>, emitter: Emitter, deadline: Duration) {
    let start = Instant::now();
    let name = source.name().to_string();

    let poll_emitter = emitter.clone();
    let mut task = tokio::spawn(async move { source.poll(&poll_emitter).await });

    match tokio::time::timeout(deadline, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(join_err)) => {
            tracing::error!(source = %name, error = %join_err, "Collector poll task failed");
            emitter.report(SourceError::Panicked(join_err.to_string())).await;
        }
        Err(_) => {
            task.abort();
            tracing::warn!(source = %name, deadline = ?deadline, "Collector poll timed out");
            emitter.report(SourceError::Timeout { deadline }).await;
        }
    }

    emitter.done(start.elapsed()).await;
}
