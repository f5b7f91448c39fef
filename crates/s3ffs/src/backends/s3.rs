//! 🪣📡 S3 object store: HEAD once, then GET one byte range at a time.
//!
//! INT. AWS CONSOLE - NIGHT. A lone flat file sits in a bucket, bloated with lines.
//! Someone typed `PUT` once and walked away. It has been waiting. Patient. Ready to be
//! read in 500MB bites by a Rust process with a `Range` header and a dream.
//!
//! 🧠 Knowledge graph:
//! - Client: `aws-config` defaults → optional static credentials → optional endpoint
//!   override → path-style addressing forced (MinIO, Ceph and friends insist on it)
//! - Transport: `GetObject` + `Range: bytes=a-b` → `ByteStream::into_async_read()` →
//!   boxed `ChunkReader`, same read path as every other store
//! - HTTP ranges are inclusive on both ends; our chunks are half-open. `range_header`
//!   does the off-by-one so nobody else has to.

use std::ops::Range;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use tracing::{debug, trace};

use crate::app_config::ObjectStoreConfig;
use crate::backends::{ChunkReader, ObjectStore};
use crate::pipeline::chunks::ObjectLocation;

/// 🪣 A thin wrapper over the AWS SDK client. All the state is in the client.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// 🚀 Build the SDK client from the object store settings.
    ///
    /// Static keys win when both are present; otherwise the SDK's default chain applies
    /// (env vars → ~/.aws/config → IAM role → hope).
    pub async fn new(config: &ObjectStoreConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                debug!("🔒 using static S3 credentials from configuration");
                loader = loader.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "s3ffs-static",
                ));
            }
            (None, None) => {}
            _ => bail!(
                "💀 Half a credential is no credential. Set both the S3 access key and secret key, or neither."
            ),
        }

        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            debug!("📡 S3 endpoint override: {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }
}

/// 📐 `[start, end)` → `bytes=start-(end-1)`.
pub(crate) fn range_header(range: &Range<u64>) -> String {
    format!("bytes={}-{}", range.start, range.end.saturating_sub(1).max(range.start))
}

/// 📏 A HEAD without a usable length is a failed HEAD, not an empty object.
fn object_len(content_length: Option<i64>, location: &ObjectLocation) -> Result<u64> {
    let Some(the_content_length) = content_length else {
        bail!("💀 HEAD for s3://{location} came back without a Content-Length. Can't chunk what we can't measure.");
    };
    u64::try_from(the_content_length)
        .with_context(|| format!("💀 HEAD for s3://{location} reported a negative length ({the_content_length})"))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&mut self, location: &ObjectLocation) -> Result<u64> {
        let the_head_response = self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .context(format!(
                "💀 HEAD request failed for s3://{}/{}. The bucket ghosted us. \
                 Check: bucket name, key path, region, endpoint and credentials.",
                location.bucket, location.key
            ))?;

        object_len(the_head_response.content_length(), location)
    }

    async fn get_range(&mut self, location: &ObjectLocation, range: Range<u64>) -> Result<ChunkReader> {
        let the_range_header = range_header(&range);
        trace!("🪣 GET s3://{} {}", location, the_range_header);

        let the_get_response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .range(&the_range_header)
            .send()
            .await
            .context(format!(
                "💀 GetObject failed for s3://{}/{} ({}). HEAD said the data is there, \
                 GET said 'we have food at home'. Check IAM permissions and bucket policy.",
                location.bucket, location.key, the_range_header
            ))?;

        Ok(Box::new(the_get_response.body.into_async_read()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_half_open_ranges_become_inclusive_headers() {
        assert_eq!(range_header(&(0..100)), "bytes=0-99");
        assert_eq!(range_header(&(100..200)), "bytes=100-199");
        assert_eq!(range_header(&(200..201)), "bytes=200-200");
    }

    #[test]
    fn the_one_where_a_head_without_a_length_is_a_failure() {
        let location = ObjectLocation::new("newbucket", "t1.txt");
        assert_eq!(object_len(Some(42), &location).expect("💀 plain length"), 42);
        assert_eq!(object_len(Some(0), &location).expect("💀 empty object"), 0);
        assert!(object_len(None, &location).is_err());
        assert!(object_len(Some(-1), &location).is_err());
    }

    #[tokio::test]
    async fn the_one_where_half_a_credential_is_refused() {
        let config = ObjectStoreConfig {
            access_key: Some("YOUR-ACCESSKEYID".into()),
            secret_key: None,
            ..ObjectStoreConfig::for_tests("newbucket", "t1.txt")
        };
        assert!(S3ObjectStore::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_a_custom_endpoint_builds_a_client_without_network() {
        let config = ObjectStoreConfig {
            access_key: Some("YOUR-ACCESSKEYID".into()),
            secret_key: Some("YOUR-SECRETACCESSKEY".into()),
            endpoint: Some("http://127.0.0.1:9000".into()),
            region: "eu-central-1".into(),
            ..ObjectStoreConfig::for_tests("newbucket", "t1.txt")
        };
        assert!(S3ObjectStore::new(&config).await.is_ok());
    }
}
