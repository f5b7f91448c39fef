//! 🚚 Dispatch: batch in, CloudEvent out, counters updated, batch cleared (maybe).
//!
//! 🧠 Knowledge graph:
//! - The dispatcher owns the run's event ID sequence (first event is `1`, IDs are never
//!   reused, a refused event still burns its ID) and the static overrides.
//! - Acknowledged: sent counter grows by the batch length, batch is cleared.
//! - Refused: error counter grows by one, the batch stays put and keeps growing. The next
//!   delivery carries the stale lines plus whatever arrived since. At-least-once-ish.
//! - Encoding failure: the only `Err`. Aborts the run.

use anyhow::Result;
use tracing::{debug, warn};

use crate::backends::{Delivery, DeliveryContext, Transport};
use crate::event::{CloudEvent, CloudEventOverrides};
use crate::pipeline::batch::BatchAccumulator;
use crate::pipeline::counters::RunCounters;

#[derive(Debug)]
pub(crate) struct Dispatcher<'t, T: Transport> {
    transport: &'t mut T,
    context: DeliveryContext,
    overrides: Option<CloudEventOverrides>,
    last_id: u64,
}

impl<'t, T: Transport> Dispatcher<'t, T> {
    pub(crate) fn new(
        transport: &'t mut T,
        context: DeliveryContext,
        overrides: Option<CloudEventOverrides>,
    ) -> Self {
        Self {
            transport,
            context,
            overrides,
            last_id: 0,
        }
    }

    /// 📬 Ship the batch as one event. Returns whether the transport acknowledged it.
    pub(crate) async fn deliver(
        &mut self,
        batch: &mut BatchAccumulator,
        counters: &mut RunCounters,
    ) -> Result<bool> {
        self.last_id += 1;
        let event = CloudEvent::new(self.last_id, batch.payload())?
            .with_overrides(self.overrides.as_ref());

        debug!("📡 delivering event {} carrying {} lines", event.id, batch.len());
        match self.transport.send(&event, &self.context).await {
            Delivery::Acked => {
                counters.record_delivered(batch.len());
                if batch.holds_sentinel() {
                    counters.record_sentinel_delivered();
                }
                batch.clear();
                Ok(true)
            }
            Delivery::NotAcked { reason } => {
                counters.record_error();
                warn!(
                    "⚠️ failed to send cloudevent {}: {}. Keeping its {} lines for the next delivery.",
                    event.id,
                    reason,
                    batch.len()
                );
                Ok(false)
            }
        }
    }
}
