//! 🔌 Backends: where the real I/O happens.
//!
//! 🪣 Object stores hand us byte ranges. 📡 Transports carry events away.
//! Everything in between (lines, batches, counters) lives in `pipeline` and never
//! touches a socket.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls → `*Backend` enum that dispatches to them
//! - `ObjectStore`: `S3ObjectStore`, `FileObjectStore`, `InMemoryObjectStore`
//! - `Transport`: `HttpTransport`, `InMemoryTransport`
//! - The pipeline is generic over both traits, the enums are what config builds
//!
//! 🦆 The duck is here because every file must have one. This is law.

use std::ops::Range;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::event::CloudEvent;
use crate::pipeline::chunks::ObjectLocation;

pub mod file;
pub mod http;
pub mod in_mem;
pub mod s3;

pub use file::FileObjectStore;
pub use http::HttpTransport;
pub use in_mem::{InMemoryObjectStore, InMemoryTransport};
pub use s3::S3ObjectStore;

// 🧠 Boxed so every store can hand back its own reader type without the pipeline caring.
pub type ChunkReader = Box<dyn AsyncRead + Send + Unpin>;

// ===== Object store trait and backend enum =====

/// 🪣 Somewhere objects live and can be read one byte range at a time.
///
/// # Contract
/// - `head` reports the total length of the object, or fails.
/// - `get_range` streams bytes `[range.start, range.end)`. A store may clamp a range that
///   runs past the end of the object; callers do not check the returned length.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send {
    /// 📏 Total length of the object in bytes.
    async fn head(&mut self, location: &ObjectLocation) -> Result<u64>;
    /// 📖 Open a reader over one byte range of the object.
    async fn get_range(&mut self, location: &ObjectLocation, range: Range<u64>) -> Result<ChunkReader>;
}

/// 🎭 The many faces of an object store: S3, the local disk, or plain RAM.
#[derive(Debug)]
pub enum ObjectStoreBackend {
    S3(S3ObjectStore),
    File(FileObjectStore),
    InMemory(InMemoryObjectStore),
}

#[async_trait]
impl ObjectStore for ObjectStoreBackend {
    async fn head(&mut self, location: &ObjectLocation) -> Result<u64> {
        match self {
            ObjectStoreBackend::S3(store) => store.head(location).await,
            ObjectStoreBackend::File(store) => store.head(location).await,
            ObjectStoreBackend::InMemory(store) => store.head(location).await,
        }
    }

    async fn get_range(&mut self, location: &ObjectLocation, range: Range<u64>) -> Result<ChunkReader> {
        match self {
            ObjectStoreBackend::S3(store) => store.get_range(location, range).await,
            ObjectStoreBackend::File(store) => store.get_range(location, range).await,
            ObjectStoreBackend::InMemory(store) => store.get_range(location, range).await,
        }
    }
}

// ===== Transport trait and backend enum =====

/// 🎯 Where events go and how hard to try before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryContext {
    /// 📡 the sink URL
    pub target: String,
    /// 🔄 retries after the first attempt, so `retries + 1` attempts in total
    pub retries: u32,
    /// ⏱️ base backoff, doubled for every retry
    pub backoff: Duration,
}

impl DeliveryContext {
    /// ⏱️ How long to wait before retry number `retry` (0-based): `backoff * 2^retry`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        // -- cap the shift, nobody wants to wait 2^31 seconds for a webhook
        self.backoff.saturating_mul(1u32 << retry.min(16))
    }
}

/// 📬 The transport's verdict once its own retries are spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Acked,
    NotAcked { reason: String },
}

impl Delivery {
    pub fn is_ack(&self) -> bool {
        matches!(self, Delivery::Acked)
    }
}

/// 📡 Something that can carry a CloudEvent to a receiver.
///
/// # Contract
/// - `send` applies the context's retry policy itself and reports the final outcome.
/// - It never returns an error; every failure is a `Delivery::NotAcked`.
#[async_trait]
pub trait Transport: std::fmt::Debug + Send {
    async fn send(&mut self, event: &CloudEvent, context: &DeliveryContext) -> Delivery;
}

/// 🎭 The many faces of a transport: a real HTTP sink or a notebook in RAM.
#[derive(Debug)]
pub enum TransportBackend {
    Http(HttpTransport),
    InMemory(InMemoryTransport),
}

#[async_trait]
impl Transport for TransportBackend {
    async fn send(&mut self, event: &CloudEvent, context: &DeliveryContext) -> Delivery {
        match self {
            TransportBackend::Http(transport) => transport.send(event, context).await,
            TransportBackend::InMemory(transport) => transport.send(event, context).await,
        }
    }
}
