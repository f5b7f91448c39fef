//! 🎬 The event source lifecycle: set the context, build the clients, generate the events.
//!
//! 🧠 Knowledge graph:
//! - `EventSource`: the three-step contract any source honors, in that order.
//! - `source_events`: the driver. Runs the steps and stops at the first fatal error.
//! - `S3FlatFileSource`: the one real source. Config in, `RunResult` out.
//! - Backends can be injected before `construct_client`; only the missing ones get built.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::app_config::{AppConfig, ObjectStoreKind};
use crate::backends::{
    DeliveryContext, FileObjectStore, HttpTransport, ObjectStoreBackend, S3ObjectStore, TransportBackend,
};
use crate::pipeline::counters::RunResult;
use crate::pipeline::run_pipeline;

/// 🎬 A source of CloudEvents.
///
/// # Contract
/// - `set_context` derives the delivery context (target plus retry policy).
/// - `construct_client` builds whatever clients the source needs to talk to the outside world.
/// - `generate_events` does the actual work and reports the counts. Only fatal problems are
///   `Err`; everything recoverable is already folded into the `RunResult`.
#[async_trait]
pub trait EventSource: Send {
    async fn set_context(&mut self) -> Result<()>;
    async fn construct_client(&mut self) -> Result<()>;
    async fn generate_events(&mut self) -> Result<RunResult>;
}

/// 🚀 Drive a source through its lifecycle.
pub async fn source_events<S: EventSource + ?Sized>(source: &mut S) -> Result<RunResult> {
    source.set_context().await.context("💀 Could not set the delivery context")?;
    source.construct_client().await.context("💀 Could not construct the clients")?;
    source.generate_events().await.context("💀 Event generation aborted")
}

/// 🪣 Streams one flat file out of an object store, a batch of lines per CloudEvent.
#[derive(Debug)]
pub struct S3FlatFileSource {
    config: AppConfig,
    context: Option<DeliveryContext>,
    store: Option<ObjectStoreBackend>,
    transport: Option<TransportBackend>,
}

impl S3FlatFileSource {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            context: None,
            store: None,
            transport: None,
        }
    }

    /// 🔌 Bring your own backends. Anything left `None` is built from config.
    pub fn with_backends(
        mut self,
        store: Option<ObjectStoreBackend>,
        transport: Option<TransportBackend>,
    ) -> Self {
        self.store = store;
        self.transport = transport;
        self
    }
}

#[async_trait]
impl EventSource for S3FlatFileSource {
    async fn set_context(&mut self) -> Result<()> {
        let context = self.config.sink.delivery_context();
        debug!(
            "🎯 delivering to {} with {} retries, {:?} base backoff",
            context.target, context.retries, context.backoff
        );
        self.context = Some(context);
        Ok(())
    }

    async fn construct_client(&mut self) -> Result<()> {
        if self.transport.is_none() {
            let transport = HttpTransport::new(self.config.sink.request_timeout())?;
            self.transport = Some(TransportBackend::Http(transport));
        }
        if self.store.is_none() {
            let store = match self.config.object_store.backend {
                ObjectStoreKind::S3 => ObjectStoreBackend::S3(S3ObjectStore::new(&self.config.object_store).await?),
                ObjectStoreKind::File => ObjectStoreBackend::File(FileObjectStore::new(".")),
            };
            self.store = Some(store);
        }
        Ok(())
    }

    async fn generate_events(&mut self) -> Result<RunResult> {
        let (Some(context), Some(store), Some(transport)) =
            (self.context.clone(), self.store.as_mut(), self.transport.as_mut())
        else {
            bail!("💀 generate_events called before set_context and construct_client. The lifecycle has an order for a reason.");
        };

        let settings = self.config.pipeline_settings(context)?;
        let location = self.config.object_store.location();
        info!("🚀 streaming {} in chunks of {} bytes", location, settings.chunk_size);
        run_pipeline(store, transport, &location, &settings).await
    }
}
