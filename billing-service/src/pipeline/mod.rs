use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};
use metering_core::InvalidReadingError;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

/// Errors flowing through a pipeline.
///
/// `Reading` marks a single bad record: sinks skip it and keep going.
/// Every other variant ends the run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("rejected reading: {0}")]
    Reading(#[from] InvalidReadingError),
}

impl PipelineError {
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::Reading(_))
    }
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

/// Terminal stage. Consumes the whole stream and reports what it produced.
#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    type Output: Send;

    async fn run<S>(&self, input: S) -> Result<Self::Output, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>, // same-type transforms chain
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<K::Output, PipelineError> {
        let mut stream = self.source.stream().await;

        for t in self.transforms {
            stream = Box::pin(stream.then(move |item| {
                let t = t.clone();
                async move {
                    match item {
                        Ok(env) => t.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        self.sink.run(stream).await
    }
}

/// Per-run tally of records seen by a sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RecordCounts {
    pub accepted: usize,
    pub rejected: usize,
}

/// Pull the next record a sink should act on, skipping rejected readings.
///
/// Returns `Ok(None)` at end of stream and `Err` for errors that must end
/// the run.
pub async fn next_accepted<T, S>(input: &mut S, counts: &mut RecordCounts) -> Result<Option<Envelope<T>>, PipelineError>
where
    S: Stream<Item = Result<Envelope<T>, PipelineError>> + Unpin,
{
    while let Some(item) = input.next().await {
        match item {
            Ok(env) => {
                counts.accepted += 1;
                return Ok(Some(env));
            }
            Err(e) if e.is_record_level() => {
                counts.rejected += 1;
                metrics::counter!("readings_rejected_total").increment(1);
                tracing::warn!(error = %e, "skipping rejected reading");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}
