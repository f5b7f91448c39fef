//! 🪣 s3ffs: stream a giant flat file out of S3, a batch of lines per CloudEvent.
//!
//! 🧠 Knowledge graph:
//! - `app_config`: figment-loaded settings, classic env names included
//! - `backends`: object stores (S3, file, RAM) and transports (HTTP, RAM)
//! - `pipeline`: chunk plan → line reconstruction → batching → delivery
//! - `event`: the CloudEvent and its overrides
//! - `source`: the set-context / construct-client / generate-events lifecycle

pub mod app_config;
pub mod backends;
pub mod event;
pub mod pipeline;
mod progress;
pub mod source;

use anyhow::Result;

pub use app_config::{AppConfig, load_config};
pub use pipeline::counters::RunResult;
pub use source::{EventSource, S3FlatFileSource, source_events};

/// 🚀 One run, start to finish: build the source from config and drive it.
pub async fn run(app_config: AppConfig) -> Result<RunResult> {
    let mut source = S3FlatFileSource::new(app_config);
    source_events(&mut source).await
}
