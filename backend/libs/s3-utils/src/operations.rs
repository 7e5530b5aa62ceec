//! Object operations: fetch, put, presign and health check

use crate::S3ObjectStore;
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use pipeline_core::{codes, ObjectStore, PipelineError, Result};
use std::time::Duration;
use tracing::{debug, error, info};

/// Shortest presigned URL lifetime accepted
pub const MIN_PRESIGN_EXPIRATION: Duration = Duration::from_secs(60);
/// Longest lifetime S3 allows for SigV4 presigned URLs (7 days)
pub const MAX_PRESIGN_EXPIRATION: Duration = Duration::from_secs(604_800);

/// Reject presigned URL lifetimes outside 60 seconds ..= 7 days
pub fn validate_expiration(expires_in: Duration) -> Result<()> {
    if expires_in < MIN_PRESIGN_EXPIRATION || expires_in > MAX_PRESIGN_EXPIRATION {
        return Err(PipelineError::invalid_input(
            codes::INVALID_EXPIRATION,
            format!(
                "Expiration must be between {} and {} seconds, got {}",
                MIN_PRESIGN_EXPIRATION.as_secs(),
                MAX_PRESIGN_EXPIRATION.as_secs(),
                expires_in.as_secs()
            ),
        ));
    }
    Ok(())
}

impl S3ObjectStore {
    /// Generate a presigned GET URL for a stored object
    pub async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String> {
        validate_expiration(expires_in)?;

        let presigning_config = PresigningConfig::expires_in(expires_in).map_err(|e| {
            PipelineError::object_store(
                codes::S3_PRESIGN_FAILED,
                "Failed to create presigning config",
                e,
            )
        })?;

        let request = self
            .client()
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| {
                error!(bucket, key, error = %e, "Failed to presign URL");
                PipelineError::object_store(
                    codes::S3_PRESIGN_FAILED,
                    format!("Failed to presign s3://{bucket}/{key}"),
                    e,
                )
            })?;

        Ok(request.uri().to_string())
    }

    /// Health check for S3 connectivity
    pub async fn health_check(&self, bucket: &str) -> Result<()> {
        self.client()
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                error!(bucket, error = %e, "S3 health check failed");
                PipelineError::object_store(
                    codes::S3_HEALTH_CHECK_FAILED,
                    format!("Bucket {bucket} is not reachable"),
                    e,
                )
            })?;

        debug!(bucket, "S3 health check passed");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let download_error = |e: Box<dyn std::error::Error + Send + Sync>| {
            PipelineError::object_store(
                codes::S3_DOWNLOAD_FAILED,
                format!("Failed to download s3://{bucket}/{key}"),
                e,
            )
        };

        debug!(bucket, key, "Downloading object");
        let response = self
            .client()
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!(bucket, key, error = %e, "GetObject failed");
                download_error(e.into())
            })?;

        let body = response.body.collect().await.map_err(|e| {
            error!(bucket, key, error = %e, "Failed to read object body");
            download_error(e.into())
        })?;

        let bytes = body.into_bytes();
        info!(bucket, key, size = bytes.len(), "Downloaded object");
        Ok(bytes)
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let size = body.len();

        self.client()
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                error!(bucket, key, error = %e, "PutObject failed");
                PipelineError::object_store(
                    codes::S3_UPLOAD_FAILED,
                    format!("Failed to upload s3://{bucket}/{key}"),
                    e,
                )
            })?;

        info!(bucket, key, size, content_type, "Uploaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::ErrorKind;

    #[test]
    fn test_expiration_bounds() {
        assert!(validate_expiration(Duration::from_secs(60)).is_ok());
        assert!(validate_expiration(Duration::from_secs(3600)).is_ok());
        assert!(validate_expiration(Duration::from_secs(604_800)).is_ok());
    }

    #[test]
    fn test_expiration_out_of_range() {
        for secs in [0, 59, 604_801] {
            let err = validate_expiration(Duration::from_secs(secs)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            assert_eq!(err.code(), codes::INVALID_EXPIRATION);
        }
    }

    #[tokio::test]
    async fn test_presign_rejects_before_calling_s3() {
        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let store = S3ObjectStore::from_client(aws_sdk_s3::Client::from_conf(conf));

        let err = store
            .presign_get("bucket", "a.jpg", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_EXPIRATION);
    }
}
