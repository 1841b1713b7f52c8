use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::TileStore;
use crate::error::StoreError;

/// S3-backed implementation of `TileStore`.
///
/// Reads and writes whole tile objects in S3 or S3-compatible storage (MinIO,
/// GCS, etc.). A location is used as the object key. Locations written as
/// `s3://<bucket>/<key>` are accepted too, as long as the bucket matches.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    identifier: String,
}

impl S3Store {
    /// Create a new S3Store for the given bucket.
    pub fn new(client: Client, bucket: String) -> Self {
        let identifier = format!("s3://{}", bucket);
        Self {
            client,
            bucket,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Map a location onto an object key within the bucket.
    pub fn key_for<'a>(&self, location: &'a str) -> &'a str {
        location
            .strip_prefix("s3://")
            .and_then(|rest| rest.strip_prefix(self.bucket.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(location)
    }
}

#[async_trait]
impl TileStore for S3Store {
    async fn get(&self, location: &str) -> Result<Bytes, StoreError> {
        let key = self.key_for(location);

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);

                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    return StoreError::NotFound(format!("s3://{}/{}", self.bucket, key));
                }

                // Fallback: check the error string for common patterns
                let err_str = e.to_string();
                if err_str.contains("NoSuchKey") || err_str.contains("NotFound") {
                    return StoreError::NotFound(format!("s3://{}/{}", self.bucket, key));
                }

                StoreError::S3(err_str)
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn put(&self, location: &str, data: Bytes) -> Result<(), StoreError> {
        let key = self.key_for(location);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::S3(e.to_string()))?;

        Ok(())
    }

    async fn exists(&self, location: &str) -> Result<bool, StoreError> {
        let key = self.key_for(location);

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                if is_not_found {
                    Ok(false)
                } else {
                    Err(StoreError::S3(e.to_string()))
                }
            }
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
