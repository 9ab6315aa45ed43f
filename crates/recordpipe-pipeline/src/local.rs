//! In-process producer and consumer around one bounded channel.
//!
//! The producer stages each record body, then hands the consumer a
//! [`SlotToken`] naming it. Only tokens move through the channel.

use std::thread;

use recordpipe_channel::{BoundedChannel, DEFAULT_CAPACITY};
use recordpipe_record::{from_markup_bytes, to_markup};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::report::{RecordReport, RecordSink, Rejection};
use crate::source::{record_identifier, Pacing, RecordSource};
use crate::staging::{Stage, StagedArtifact};

const TOKEN_PREFIX: &str = "student";

/// One in-flight record. Moves from producer to consumer exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct SlotToken(u64);

impl SlotToken {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn seq(&self) -> u64 {
        self.0
    }

    /// Staging identifier, `student{seq}.xml`.
    pub fn identifier(&self) -> String {
        record_identifier(TOKEN_PREFIX, self.0)
    }
}

/// Settings for [`run_local`].
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Records to produce.
    pub count: u64,
    /// Channel slots.
    pub capacity: usize,
    pub pacing: Pacing,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            count: 10,
            capacity: DEFAULT_CAPACITY,
            pacing: Pacing::none(),
        }
    }
}

/// Totals from one [`run_local`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalSummary {
    pub produced: u64,
    pub consumed: u64,
    pub rejected: u64,
}

/// Closes the channel when its side of the pipeline exits, however it exits.
struct CloseOnDrop<'a, T>(&'a BoundedChannel<T>);

impl<T> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Run a producer and a consumer on two threads until `config.count`
/// records have passed through a channel of `config.capacity` slots.
///
/// Per-record consumer failures become [`Rejection`]s. Producer failures,
/// including a capacity violation, end the run with an error.
pub fn run_local(
    config: &LocalConfig,
    source: &mut dyn RecordSource,
    stage: &dyn Stage,
    sink: &dyn RecordSink,
) -> Result<LocalSummary> {
    let channel = BoundedChannel::new(config.capacity)?;
    info!(
        count = config.count,
        capacity = config.capacity,
        "starting local pipeline"
    );

    let (produced, consumed) = thread::scope(|scope| {
        let producer = scope.spawn(|| {
            let _close = CloseOnDrop(&channel);
            produce(config, source, stage, &channel)
        });
        let consumer = scope.spawn(|| {
            let _close = CloseOnDrop(&channel);
            consume(&config.pacing, stage, sink, &channel)
        });
        (producer.join(), consumer.join())
    });

    let produced = produced.map_err(|_| PipelineError::ThreadPanicked("producer"))??;
    let (consumed, rejected) = consumed.map_err(|_| PipelineError::ThreadPanicked("consumer"))?;

    let summary = LocalSummary {
        produced,
        consumed,
        rejected,
    };
    info!(?summary, "local pipeline finished");
    Ok(summary)
}

fn produce(
    config: &LocalConfig,
    source: &mut dyn RecordSource,
    stage: &dyn Stage,
    channel: &BoundedChannel<SlotToken>,
) -> Result<u64> {
    let mut produced = 0;
    for seq in 1..=config.count {
        let permit = channel.reserve()?;
        let token = SlotToken::new(seq);
        let identifier = token.identifier();

        let record = source.next_record(seq);
        let artifact = stage.stage(&identifier, to_markup(&record).as_bytes())?;

        if let Err(err) = permit.commit(token) {
            discard(stage, artifact);
            return Err(err.into());
        }
        produced += 1;
        info!(%identifier, name = record.name(), "produced record");
        config.pacing.wait();
    }
    Ok(produced)
}

fn consume(
    pacing: &Pacing,
    stage: &dyn Stage,
    sink: &dyn RecordSink,
    channel: &BoundedChannel<SlotToken>,
) -> (u64, u64) {
    let mut consumed = 0;
    let mut rejected = 0;
    while let Some(token) = channel.take() {
        let identifier = token.identifier();
        match consume_one(&identifier, stage) {
            Ok(report) => {
                sink.report(&report);
                consumed += 1;
                info!(%identifier, average = report.average, "consumed record");
            }
            Err(err) => {
                warn!(%identifier, kind = %err.kind(), error = %err, "record rejected");
                sink.reject(&Rejection::new(Some(identifier), &err));
                rejected += 1;
            }
        }
        pacing.wait();
    }
    (consumed, rejected)
}

fn consume_one(identifier: &str, stage: &dyn Stage) -> Result<RecordReport> {
    let artifact = stage.locate(identifier)?;
    let body = stage.load(&artifact)?;
    let decoded = from_markup_bytes(&body);
    discard(stage, artifact);
    Ok(RecordReport::new(identifier, &decoded?))
}

/// Remove a staged artifact, logging rather than failing.
pub(crate) fn discard(stage: &dyn Stage, artifact: StagedArtifact) {
    let identifier = artifact.identifier().to_string();
    match stage.unstage(artifact) {
        Ok(()) => debug!(%identifier, "artifact removed"),
        Err(err) => warn!(%identifier, error = %err, "failed to remove staged artifact"),
    }
}
