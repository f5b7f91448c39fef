//! 📡 HTTP transport: CloudEvents over HTTP, binary content mode.
//!
//! The event attributes ride in `ce-*` headers, the data rides in the body, and the
//! receiver (a Knative sink, a broker, a webhook with ambitions) answers 2xx or doesn't.
//!
//! 🔄 Retries live here, not in the pipeline: `retries + 1` attempts, exponential backoff
//! between them, and only for failures worth retrying (network errors, 408, 429, 5xx).
//! A 400 will still be a 400 in eight seconds, so we don't wait around for it.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, trace, warn};

use crate::backends::{Delivery, DeliveryContext, Transport};
use crate::event::CloudEvent;

/// 📡 A reusable HTTP client that knows how to speak CloudEvents.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

/// 💀 One failed attempt, and whether another attempt could plausibly help.
struct AttemptFailure {
    retryable: bool,
    reason: String,
}

impl HttpTransport {
    /// 🚀 Build the client. 10 seconds to connect, `request_timeout` for the whole exchange.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert store.")?;
        Ok(Self { client })
    }

    async fn attempt(&self, event: &CloudEvent, target: &str) -> Result<(), AttemptFailure> {
        let mut request = self
            .client
            .post(target)
            .header("ce-specversion", event.specversion)
            .header("ce-id", event.id.as_str())
            .header("ce-type", event.event_type)
            .header("ce-source", event.source)
            .header("content-type", event.datacontenttype);
        for (name, value) in &event.extensions {
            request = request.header(format!("ce-{name}"), value.as_str());
        }

        let response = request
            .body(event.data.clone())
            .send()
            .await
            .map_err(|err| AttemptFailure {
                retryable: true,
                reason: format!("error sending request: {err}"),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AttemptFailure {
            retryable: is_retryable(status),
            reason: format!("{status}: {body}"),
        })
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, event: &CloudEvent, context: &DeliveryContext) -> Delivery {
        let mut last_reason = String::new();

        for attempt in 0..=context.retries {
            if attempt > 0 {
                let delay = context.backoff_for(attempt - 1);
                debug!("🔄 retrying event {} in {:?} (attempt {})", event.id, delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(event, &context.target).await {
                Ok(()) => {
                    trace!("🚀 event {} landed on {}", event.id, context.target);
                    return Delivery::Acked;
                }
                Err(failure) => {
                    warn!(
                        "⚠️ event {} attempt {} to {} failed: {}",
                        event.id,
                        attempt + 1,
                        context.target,
                        failure.reason
                    );
                    last_reason = failure.reason;
                    if !failure.retryable {
                        break;
                    }
                }
            }
        }

        Delivery::NotAcked {
            reason: last_reason,
        }
    }
}
