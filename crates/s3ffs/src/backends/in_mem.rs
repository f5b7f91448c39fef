//! # Previously, on s3ffs...
//!
//! 🎬 The bucket was in us-east-1. The sink was in another cluster. The tests were in CI,
//! with no network, no credentials, and no patience. Someone had to play both parts.
//!
//! `in_mem` provides an in-memory [`ObjectStore`] and [`Transport`] for tests and local
//! poking. The store serves byte ranges out of a `HashMap` and can be told to fail from a
//! given offset onward. The transport writes down every event it is handed behind an
//! `Arc<Mutex<...>>` so tests can inspect what arrived, and it can be scripted to refuse.
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please also deploy a therapist.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::ops::Range;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{ChunkReader, Delivery, DeliveryContext, ObjectStore, Transport};
use crate::event::CloudEvent;
use crate::pipeline::chunks::ObjectLocation;

/// 📦 A bucket that lives and dies with the process.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    objects: HashMap<ObjectLocation, Arc<[u8]>>,
    /// 💥 every range request starting at or past this offset fails
    fail_from: Option<u64>,
    fail_head: bool,
    /// 📜 every range requested, in order: the paper trail
    requested: Arc<Mutex<Vec<Range<u64>>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, location: ObjectLocation, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        self.objects.insert(location, Arc::from(bytes));
        self
    }

    /// 💥 Make every range request that starts at `offset` or later fail.
    pub fn failing_from(mut self, offset: u64) -> Self {
        self.fail_from = Some(offset);
        self
    }

    /// 💥 Make HEAD fail, as if the object were never there.
    pub fn failing_head(mut self) -> Self {
        self.fail_head = true;
        self
    }

    /// 📜 Shared handle on the ranges requested so far.
    pub fn requested_ranges(&self) -> Arc<Mutex<Vec<Range<u64>>>> {
        Arc::clone(&self.requested)
    }

    fn object(&self, location: &ObjectLocation) -> Result<&Arc<[u8]>> {
        self.objects
            .get(location)
            .ok_or_else(|| anyhow!("💀 NoSuchKey: {location} is not in the in-memory bucket"))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn head(&mut self, location: &ObjectLocation) -> Result<u64> {
        if self.fail_head {
            bail!("💀 HEAD {location} failed on purpose. The script said so.");
        }
        Ok(self.object(location)?.len() as u64)
    }

    async fn get_range(&mut self, location: &ObjectLocation, range: Range<u64>) -> Result<ChunkReader> {
        self.requested.lock().await.push(range.clone());
        if self.fail_from.is_some_and(|offset| range.start >= offset) {
            bail!("💀 GET {location} bytes {}..{} failed on purpose", range.start, range.end);
        }
        let bytes = self.object(location)?;
        // 🔧 clamp like a real store would when the range runs off the end
        let len = bytes.len() as u64;
        let start = usize::try_from(range.start.min(len))?;
        let end = usize::try_from(range.end.min(len))?;
        Ok(Box::new(Cursor::new(bytes[start..end].to_vec())))
    }
}

/// 📬 A transport that never forgets. Unlike my dad, who forgot my soccer game in 1998.
///
/// Clone-able because tests hand one copy to the pipeline and keep the other to peek at
/// `received` afterwards. The `Arc` means everyone shares the same notebook.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransport {
    pub received: Arc<Mutex<Vec<CloudEvent>>>,
    /// 🎭 upcoming verdicts, `false` = refuse; when empty, everything is acknowledged
    script: Arc<Mutex<VecDeque<bool>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🎭 Queue up verdicts for the next sends, in order.
    pub async fn script(&self, verdicts: impl IntoIterator<Item = bool>) {
        self.script.lock().await.extend(verdicts);
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, event: &CloudEvent, _context: &DeliveryContext) -> Delivery {
        let acked = self.script.lock().await.pop_front().unwrap_or(true);
        if !acked {
            return Delivery::NotAcked {
                reason: format!("scripted refusal for event {}", event.id),
            };
        }
        self.received.lock().await.push(event.clone());
        Delivery::Acked
    }
}
