//! 🔧 App Configuration: the sacred env-and-TOML-to-struct pipeline.
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of self-harm that
//! even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph, lowest to highest precedence:
//! 1. The classic Knative / S3 env names (`K_SINK`, `S3_BUCKET`, `DOWNLOAD_CHUNK_SIZE`, ...)
//!    that deployments of this source have always set. Mapped onto the nested keys below.
//! 2. `S3FFS_*` env vars, `__` for nesting: `S3FFS_SINK__DUMP_COUNT=50`.
//! 3. An optional TOML file. TOML wins on conflicts.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
    value::{Uncased, UncasedStr},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::DeliveryContext;
use crate::event::CloudEventOverrides;
use crate::pipeline::PipelineSettings;
use crate::pipeline::chunks::ObjectLocation;

/// 📦 The whole configuration: where events go, which object feeds them,
/// and how the pipeline in between behaves.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub sink: SinkConfig,
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// 📡 Where events go and how stubbornly we try.
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    /// 📡 the receiver URL (`K_SINK`)
    pub url: String,
    /// 🎨 `{"extensions": {...}}` as a JSON string (`K_CE_OVERRIDES`) or as a TOML table
    #[serde(default)]
    pub ce_overrides: Option<serde_json::Value>,
    /// 🧺 lines per event (`SINK_DUMP_COUNT`)
    #[serde(default = "default_dump_count")]
    pub dump_count: usize,
    /// 🔄 retries after the first attempt (`SINK_RETRY_COUNT`)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// ⏱️ base backoff in seconds, doubled per retry (`SINK_RETRY_INTERVAL`)
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// ⏱️ per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_dump_count() -> usize {
    100
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_interval_secs() -> u64 {
    1
}

// -- 30 seconds. A sink slower than that is a sink in trouble.
fn default_request_timeout_secs() -> u64 {
    30
}

impl SinkConfig {
    /// 🎯 The target and retry policy the transport applies on every send.
    pub fn delivery_context(&self) -> DeliveryContext {
        DeliveryContext {
            target: self.url.clone(),
            retries: self.retry_count,
            backoff: Duration::from_secs(self.retry_interval_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 🎨 Parse the overrides, whichever shape they arrived in.
    pub fn overrides(&self) -> Result<Option<CloudEventOverrides>> {
        match &self.ce_overrides {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(raw)) => CloudEventOverrides::parse(raw),
            Some(table) => CloudEventOverrides::parse(&table.to_string()),
        }
    }
}

/// 🗄️ Which kind of store the object lives in.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreKind {
    #[default]
    S3,
    /// 📂 `bucket` is a directory, `key` a path inside it
    File,
}

/// 🪣 Which object, where, and how big a bite to take.
#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub backend: ObjectStoreKind,
    /// 🪣 `S3_BUCKET`
    pub bucket: String,
    /// 🗝️ `S3_FILE_NAME`
    pub key: String,
    /// 🌎 `S3_REGION`: defaults to us-east-1, the Florida of AWS regions
    #[serde(default = "default_region")]
    pub region: String,
    /// 🔒 `S3_ACCESS_KEY`
    #[serde(default)]
    pub access_key: Option<String>,
    /// 🔒 `S3_SECRET_KEY`
    #[serde(default)]
    pub secret_key: Option<String>,
    /// 📡 `S3_URL`: custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 📦 `DOWNLOAD_CHUNK_SIZE`: bytes per ranged GET
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

// -- 500MB. Big enough to be worth a round trip, small enough to not be the whole file.
fn default_chunk_size() -> u64 {
    500_000_000
}

impl ObjectStoreConfig {
    pub fn location(&self) -> ObjectLocation {
        ObjectLocation::new(self.bucket.clone(), self.key.clone())
    }

    #[cfg(test)]
    pub(crate) fn for_tests(bucket: &str, key: &str) -> Self {
        Self {
            backend: ObjectStoreKind::S3,
            bucket: bucket.to_string(),
            key: key.to_string(),
            region: default_region(),
            access_key: None,
            secret_key: None,
            endpoint: None,
            chunk_size: default_chunk_size(),
        }
    }
}

/// 🧯 Knobs for the pipeline itself.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_max_consecutive_read_errors")]
    pub max_consecutive_read_errors: u32,
    #[serde(default)]
    pub show_progress: bool,
}

fn default_max_consecutive_read_errors() -> u32 {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_consecutive_read_errors: default_max_consecutive_read_errors(),
            show_progress: false,
        }
    }
}

impl AppConfig {
    /// ✅ Reject the configurations that can only end in tears.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.sink.url.trim().is_empty(), "💀 sink.url (K_SINK) is empty. Events need somewhere to go.");
        ensure!(self.sink.dump_count > 0, "💀 sink.dump_count (SINK_DUMP_COUNT) must be at least 1");
        ensure!(
            self.sink.request_timeout_secs > 0,
            "💀 sink.request_timeout_secs must be at least 1, or every delivery times out on arrival"
        );
        ensure!(
            self.object_store.chunk_size > 0,
            "💀 object_store.chunk_size (DOWNLOAD_CHUNK_SIZE) must be at least 1 byte"
        );
        ensure!(!self.object_store.bucket.is_empty(), "💀 object_store.bucket (S3_BUCKET) is empty");
        ensure!(!self.object_store.key.is_empty(), "💀 object_store.key (S3_FILE_NAME) is empty");
        self.sink.overrides().context("💀 sink.ce_overrides (K_CE_OVERRIDES) is invalid")?;
        Ok(())
    }

    /// 🔧 Everything a pipeline run needs, built around an already-derived delivery context.
    pub fn pipeline_settings(&self, delivery: DeliveryContext) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            chunk_size: self.object_store.chunk_size,
            dump_threshold: self.sink.dump_count,
            max_consecutive_read_errors: self.pipeline.max_consecutive_read_errors,
            delivery,
            overrides: self.sink.overrides()?,
            show_progress: self.pipeline.show_progress,
        })
    }
}

/// 🗺️ The classic env names, mapped to where they live now.
fn legacy_env_key(key: &UncasedStr) -> Option<Uncased<'_>> {
    let mapped = match key.as_str().to_ascii_uppercase().as_str() {
        "K_SINK" => "sink.url",
        "K_CE_OVERRIDES" => "sink.ce_overrides",
        "SINK_DUMP_COUNT" => "sink.dump_count",
        "SINK_RETRY_COUNT" => "sink.retry_count",
        "SINK_RETRY_INTERVAL" => "sink.retry_interval_secs",
        "S3_BUCKET" => "object_store.bucket",
        "S3_FILE_NAME" => "object_store.key",
        "S3_REGION" => "object_store.region",
        "S3_ACCESS_KEY" => "object_store.access_key",
        "S3_SECRET_KEY" => "object_store.secret_key",
        "S3_URL" => "object_store.endpoint",
        "DOWNLOAD_CHUNK_SIZE" => "object_store.chunk_size",
        _ => return None,
    };
    Some(Uncased::from(mapped))
}

/// 🚀 Load the config: classic env names, then `S3FFS_*`, then the TOML file if given.
///
/// 💀 Returns an error if the config is unparseable or fails validation. The message says
/// where we looked, because "error: error" helps nobody at 3am.
pub fn load_config(config_file_name: Option<&Path>) -> Result<AppConfig> {
    info!("🔧 Loading configuration: {:?}", config_file_name.unwrap_or(Path::new("")));

    let config = Figment::new()
        .merge(Env::raw().filter_map(legacy_env_key))
        .merge(Env::prefixed("S3FFS_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (K_*, S3_*, S3FFS_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (K_*, S3_*, S3FFS_*). \
                 No file was provided: this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load_in_jail(file: Option<&str>) -> figment::error::Result<AppConfig> {
        load_config(file.map(Path::new)).map_err(|e| format!("{e:#}").into())
    }

    #[test]
    fn the_one_where_the_classic_env_names_still_work() {
        Jail::expect_with(|jail| {
            jail.set_env("K_SINK", "http://broker.default.svc/");
            jail.set_env("K_CE_OVERRIDES", r#"{"extensions":{"team":"ingest"}}"#);
            jail.set_env("SINK_DUMP_COUNT", "5");
            jail.set_env("SINK_RETRY_COUNT", "2");
            jail.set_env("SINK_RETRY_INTERVAL", "4");
            jail.set_env("S3_BUCKET", "newbucket");
            jail.set_env("S3_FILE_NAME", "t1.txt");
            jail.set_env("S3_REGION", "eu-central-1");
            jail.set_env("S3_ACCESS_KEY", "YOUR-ACCESSKEYID");
            jail.set_env("S3_SECRET_KEY", "YOUR-SECRETACCESSKEY");
            jail.set_env("S3_URL", "http://127.0.0.1:9000");
            jail.set_env("DOWNLOAD_CHUNK_SIZE", "100");

            let config = load_in_jail(None)?;
            assert_eq!(config.sink.url, "http://broker.default.svc/");
            assert_eq!(config.sink.dump_count, 5);
            assert_eq!(
                config.sink.delivery_context(),
                DeliveryContext {
                    target: "http://broker.default.svc/".into(),
                    retries: 2,
                    backoff: Duration::from_secs(4),
                }
            );
            assert_eq!(config.object_store.location(), ObjectLocation::new("newbucket", "t1.txt"));
            assert_eq!(config.object_store.region, "eu-central-1");
            assert_eq!(config.object_store.endpoint.as_deref(), Some("http://127.0.0.1:9000"));
            assert_eq!(config.object_store.chunk_size, 100);
            assert_eq!(config.object_store.backend, ObjectStoreKind::S3);

            let overrides = config.sink.overrides().map_err(|e| e.to_string())?;
            assert_eq!(
                overrides.and_then(|o| o.extensions.get("team").cloned()).as_deref(),
                Some("ingest")
            );
            Ok(())
        });
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        Jail::expect_with(|jail| {
            jail.set_env("K_SINK", "http://sink/");
            jail.set_env("S3_BUCKET", "b");
            jail.set_env("S3_FILE_NAME", "k");

            let config = load_in_jail(None)?;
            assert_eq!(config.sink.dump_count, 100);
            assert_eq!(config.sink.retry_count, 3);
            assert_eq!(config.sink.retry_interval_secs, 1);
            assert_eq!(config.object_store.chunk_size, 500_000_000);
            assert_eq!(config.object_store.region, "us-east-1");
            assert_eq!(config.pipeline.max_consecutive_read_errors, 3);
            assert!(!config.pipeline.show_progress);
            assert!(config.sink.overrides().map_err(|e| e.to_string())?.is_none());
            Ok(())
        });
    }

    #[test]
    fn the_one_where_toml_beats_the_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("K_SINK", "http://from-env/");
            jail.set_env("S3FFS_SINK__DUMP_COUNT", "42");
            jail.create_file(
                "s3ffs.toml",
                r#"
                [sink]
                url = "http://from-toml/"

                [sink.ce_overrides.extensions]
                tier = "gold"

                [object_store]
                backend = "file"
                bucket = "data"
                key = "lines.txt"
                chunk_size = 4096

                [pipeline]
                max_consecutive_read_errors = 7
                show_progress = true
                "#,
            )?;

            let config = load_in_jail(Some("s3ffs.toml"))?;
            assert_eq!(config.sink.url, "http://from-toml/");
            // -- only set in the env, so the env value survives
            assert_eq!(config.sink.dump_count, 42);
            assert_eq!(config.object_store.backend, ObjectStoreKind::File);
            assert_eq!(config.object_store.chunk_size, 4096);
            assert_eq!(config.pipeline.max_consecutive_read_errors, 7);
            assert!(config.pipeline.show_progress);

            let overrides = config.sink.overrides().map_err(|e| e.to_string())?;
            assert_eq!(
                overrides.and_then(|o| o.extensions.get("tier").cloned()).as_deref(),
                Some("gold")
            );
            Ok(())
        });
    }

    #[test]
    fn the_one_where_a_toml_file_alone_is_enough() {
        let mut config_file = tempfile::NamedTempFile::new().expect("💀 tempfile");
        // 🧪 a real file on disk, because Figment wants TOML from disk, like it's method acting
        std::io::Write::write_all(
            &mut config_file,
            br#"
            [sink]
            url = "http://sink/"

            [object_store]
            bucket = "newbucket"
            key = "t1.txt"
            "#,
        )
        .expect("💀 write config");

        let app_config: AppConfig = Figment::new()
            .merge(Toml::file(config_file.path()))
            .extract()
            .expect("💀 minimal TOML should parse");
        app_config.validate().expect("💀 minimal TOML is valid");
        assert_eq!(app_config.object_store.backend, ObjectStoreKind::S3);
        assert_eq!(app_config.sink.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn the_one_where_nonsense_gets_rejected_before_any_bytes_move() {
        Jail::expect_with(|jail| {
            jail.set_env("K_SINK", "http://sink/");
            jail.set_env("S3_BUCKET", "b");
            jail.set_env("S3_FILE_NAME", "k");
            jail.set_env("SINK_DUMP_COUNT", "0");
            assert!(load_config(None).is_err());

            jail.set_env("SINK_DUMP_COUNT", "10");
            jail.set_env("DOWNLOAD_CHUNK_SIZE", "0");
            assert!(load_config(None).is_err());

            jail.set_env("DOWNLOAD_CHUNK_SIZE", "10");
            jail.set_env("S3FFS_SINK__REQUEST_TIMEOUT_SECS", "0");
            assert!(load_config(None).is_err());

            jail.set_env("S3FFS_SINK__REQUEST_TIMEOUT_SECS", "30");
            jail.set_env("K_CE_OVERRIDES", "{definitely not json");
            assert!(load_config(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn the_one_where_a_missing_sink_is_a_loud_error() {
        Jail::expect_with(|jail| {
            jail.set_env("S3_BUCKET", "b");
            jail.set_env("S3_FILE_NAME", "k");
            let err = load_config(None).expect_err("💀 no sink url should not parse");
            assert!(format!("{err:#}").contains("environment variables"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_settings_carry_everything_the_run_needs() {
        let config = AppConfig {
            sink: SinkConfig {
                url: "http://sink/".into(),
                ce_overrides: Some(serde_json::json!({ "extensions": { "a": "b" } })),
                dump_count: 5,
                retry_count: 0,
                retry_interval_secs: 0,
                request_timeout_secs: 1,
            },
            object_store: ObjectStoreConfig {
                chunk_size: 100,
                ..ObjectStoreConfig::for_tests("newbucket", "t1.txt")
            },
            pipeline: PipelineConfig::default(),
        };
        config.validate().expect("💀 valid config");
        let settings = config
            .pipeline_settings(config.sink.delivery_context())
            .expect("💀 settings build");
        assert_eq!(settings.chunk_size, 100);
        assert_eq!(settings.dump_threshold, 5);
        assert!(settings.overrides.is_some());
    }
}
