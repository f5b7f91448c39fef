//! ✉️ The envelope: every batch leaves the building wrapped as a CloudEvent.
//!
//! 🧠 Knowledge graph:
//! - `CloudEvent`: id, type, source, content type, extensions, and the already-encoded
//!   JSON data payload. Transports decide how to put it on the wire.
//! - `EventData`: the `{"Data": "..."}` body receivers have always been handed.
//! - `CloudEventOverrides`: the Knative `K_CE_OVERRIDES` JSON, `{"extensions": {...}}`,
//!   stamped onto every outbound event.

use std::collections::BTreeMap;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub const SPEC_VERSION: &str = "1.0";
pub const EVENT_TYPE: &str = "s3-flat-file-source";
pub const EVENT_SOURCE: &str = "https://github.com/itsmurugappan/s3-flat-file-source";
pub const DATA_CONTENT_TYPE: &str = "application/json";

/// 📦 The data payload shape. One field. Capital D. Receivers depend on it, so it stays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(rename = "Data")]
    pub data: String,
}

/// ✉️ One outbound event, one batch inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudEvent {
    pub specversion: &'static str,
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub source: &'static str,
    pub datacontenttype: &'static str,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, String>,
    /// 🧾 JSON text of an `EventData`, encoded once when the event is built.
    #[serde(skip)]
    pub data: String,
}

impl CloudEvent {
    /// 🏗️ Wrap a batch payload. Fails only if the payload refuses to become JSON.
    pub fn new(id: u64, payload: String) -> Result<Self> {
        let data = serde_json::to_string(&EventData { data: payload })
            .context("💀 The batch payload could not be encoded as event data. This one is not retryable.")?;
        Ok(Self {
            specversion: SPEC_VERSION,
            id: id.to_string(),
            event_type: EVENT_TYPE,
            source: EVENT_SOURCE,
            datacontenttype: DATA_CONTENT_TYPE,
            extensions: BTreeMap::new(),
            data,
        })
    }

    /// 🎨 Overlay the static extension attributes. Later values win, same as setting twice.
    pub fn with_overrides(mut self, overrides: Option<&CloudEventOverrides>) -> Self {
        if let Some(overrides) = overrides {
            self.extensions
                .extend(overrides.extensions.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }

    /// 🔍 Decode the data payload back out. Handy for receivers and tests alike.
    pub fn event_data(&self) -> Result<EventData> {
        serde_json::from_str(&self.data).context("💀 Event data is not the JSON we encoded. Spooky.")
    }
}

/// 🎨 Static extension attributes applied to every event of a run.
/// 🔒 Context attribute names an extension may not shadow.
const RESERVED_ATTRIBUTES: [&str; 9] = [
    "specversion",
    "id",
    "type",
    "source",
    "datacontenttype",
    "dataschema",
    "subject",
    "time",
    "data",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CloudEventOverrides {
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl CloudEventOverrides {
    /// 🔧 Parse the `{"extensions": {...}}` JSON. Blank input means "no overrides".
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let overrides: Self = serde_json::from_str(raw)
            .with_context(|| format!("💀 Unparseable CloudEvents overrides '{raw}'"))?;
        for name in overrides.extensions.keys() {
            // -- CloudEvents attribute names: lowercase a-z and 0-9, nothing else
            ensure!(
                !name.is_empty()
                    && name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()),
                "💀 Extension name '{name}' is not a valid CloudEvents attribute name (lowercase letters and digits only)"
            );
            ensure!(
                !RESERVED_ATTRIBUTES.contains(&name.as_str()),
                "💀 Extension name '{name}' would shadow a CloudEvents context attribute"
            );
        }
        Ok(Some(overrides))
    }
}
