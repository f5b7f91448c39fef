//! 🎬 *[camera pans across a bucket the size of a small moon]*
//! 🎬 "In a world where objects are too big to download... one loop dared to chunk them."
//!
//! 📦 The pipeline driver: fetch → reconstruct → batch → deliver, one chunk at a time.
//!
//! 🧠 Knowledge graph (the state machine, as walked by `run_pipeline`):
//! - INIT: fresh counters, fresh carry buffer, fresh ID sequence (first event gets `1`)
//! - FETCHING(i): HEAD once up front, then GET chunk `i`. A failed fetch is counted and
//!   jumps straight to FLUSHING with whatever is already batched.
//! - DELIVERING_IF_FULL: every reconstructed line is appended; hitting the dump threshold
//!   ships the batch immediately, mid-chunk or not.
//! - FLUSHING: leftover carry becomes a line, the `EOF` sentinel is appended, one final
//!   delivery happens no matter how small the batch is.
//! - DONE: counters frozen into a `RunResult`.
//!
//! Strictly sequential. One chunk in flight, ever. Nothing here is shared across runs.

pub mod batch;
pub mod chunks;
pub mod counters;
pub(crate) mod dispatcher;
pub(crate) mod reconstructor;

use anyhow::Result;
use tracing::{error, info, info_span, Instrument};

use crate::backends::{DeliveryContext, ObjectStore, Transport};
use crate::event::CloudEventOverrides;
use crate::progress::ProgressMetrics;
use batch::BatchAccumulator;
use chunks::{ChunkPlan, ObjectDescriptor, ObjectLocation};
use counters::{RunCounters, RunResult};
use dispatcher::Dispatcher;
use reconstructor::LineReconstructor;

/// 🔧 Everything one run needs to know, already validated.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// 📦 bytes per ranged GET
    pub chunk_size: u64,
    /// 🧺 lines per event
    pub dump_threshold: usize,
    /// 🧯 consecutive read errors tolerated inside one chunk before abandoning it
    pub max_consecutive_read_errors: u32,
    /// 🎯 sink target plus retry policy, handed to the transport
    pub delivery: DeliveryContext,
    /// 🎨 static extension attributes for every event
    pub overrides: Option<CloudEventOverrides>,
    /// 📊 draw a progress bar while chunks are consumed
    pub show_progress: bool,
}

/// 🚀 Stream one object through to the transport and report what happened.
///
/// Recoverable failures (HEAD, GET, read, delivery) only bump the error counter.
/// `Err` comes back for a batch payload that cannot be encoded, or for settings that
/// `AppConfig::validate` would have refused (a zero chunk size).
pub async fn run_pipeline<S, T>(
    store: &mut S,
    transport: &mut T,
    location: &ObjectLocation,
    settings: &PipelineSettings,
) -> Result<RunResult>
where
    S: ObjectStore,
    T: Transport,
{
    // 🏁 INIT
    let mut counters = RunCounters::new();
    let mut reconstructor = LineReconstructor::new(settings.max_consecutive_read_errors);
    let mut batch = BatchAccumulator::new(settings.dump_threshold);
    let mut dispatcher = Dispatcher::new(transport, settings.delivery.clone(), settings.overrides.clone());

    match store.head(location).await {
        Ok(len) => {
            let object = ObjectDescriptor {
                location: location.clone(),
                len,
            };
            let plan = ChunkPlan::new(object.len, settings.chunk_size)?;
            info!("🔪 chunks to process: {} ({} bytes in {})", plan.chunk_count(), object.len, object.location);
            let mut progress = settings
                .show_progress
                .then(|| ProgressMetrics::new(object.location.to_string(), object.len));

            for chunk in plan {
                // 📡 FETCHING(i)
                info!(
                    "📦 processing chunk {}, starting byte {}, ending byte {}",
                    chunk.index, chunk.start, chunk.end
                );
                let reader = match store.get_range(&object.location, chunk.range()).await {
                    Ok(reader) => reader,
                    Err(err) => {
                        counters.record_error();
                        error!("💀 error getting chunk {} of {}: {:#}", chunk.index, object.location, err);
                        break;
                    }
                };

                let span = info_span!("chunk", index = chunk.index);
                let mut lines_in_chunk = 0u64;
                async {
                    let mut lines = reconstructor.chunk(reader);
                    while let Some(line) = lines.next_line(&mut counters).await {
                        lines_in_chunk += 1;
                        // 🚚 DELIVERING_IF_FULL
                        if batch.push(line) {
                            dispatcher.deliver(&mut batch, &mut counters).await?;
                        }
                    }
                    anyhow::Ok(())
                }
                .instrument(span)
                .await?;

                if let Some(progress) = progress.as_mut() {
                    progress.chunk_done(chunk.len(), lines_in_chunk);
                }
            }

            if let Some(progress) = progress.as_ref() {
                progress.finish();
            }
        }
        Err(err) => {
            counters.record_error();
            error!("💀 could not size up {}: {:#}", location, err);
        }
    }

    // 🧺 FLUSHING
    if let Some(tail) = reconstructor.take_carry() {
        batch.push(tail);
    }
    batch.push_sentinel();
    dispatcher.deliver(&mut batch, &mut counters).await?;

    // ✅ DONE
    let result = counters.snapshot();
    info!(
        "🏁 run finished: {} lines sent, {} errors",
        result.sent_count, result.error_count
    );
    Ok(result)
}
