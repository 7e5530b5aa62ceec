//! S3-backed object store for the image pipeline
//!
//! Wraps the AWS S3 client behind the `ObjectStore` seam and adds the
//! presigned-URL and health-check helpers used by the read side.

use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use pipeline_core::{Deferred, ObjectStore};
use std::sync::Arc;
use tracing::debug;

pub mod config;
pub mod operations;

pub use config::S3Config;
pub use operations::{validate_expiration, MAX_PRESIGN_EXPIRATION, MIN_PRESIGN_EXPIRATION};

/// Object store for a handler whose S3 settings may be invalid.
///
/// A configuration fault stands in for the client and fails every
/// operation with the original configuration error.
pub async fn connect_object_store(config: Deferred<S3Config>) -> Arc<dyn ObjectStore> {
    match config {
        Ok(config) => Arc::new(S3ObjectStore::connect(&config).await),
        Err(fault) => Arc::new(fault),
    }
}

/// Shared S3 client wrapper
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Arc<Client>,
}

impl S3ObjectStore {
    /// Build a client from configuration.
    ///
    /// Static credentials are used only when both halves are set; otherwise
    /// the default provider chain applies. A custom endpoint switches to
    /// path-style addressing for S3-compatible stores.
    pub async fn connect(config: &S3Config) -> Self {
        let timeouts = aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(config.connect_timeout())
            .operation_timeout(config.operation_timeout())
            .build();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(timeouts);

        if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "image_pipeline_s3",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        debug!(region = %config.region, endpoint = ?config.endpoint, "S3 client configured");

        Self::from_client(Client::from_conf(s3_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get reference to underlying AWS S3 client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
