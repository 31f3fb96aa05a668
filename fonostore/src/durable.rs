//! Durable tier backed by an S3-compatible object store.
//!
//! Objects live under a namespaced key prefix. Reads fetch the whole object
//! into memory once — an accepted scaling limit for audio-sized payloads.

use crate::error::{Result, StoreError};
use crate::tier::{validate_locator, StorageTier, TierObject};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use fonoconfig::DurableTierSettings;
use std::path::Path;
use tracing::debug;

/// S3-compatible object store tier.
pub struct DurableTier {
    client: Client,
    bucket: String,
    prefix: String,
}

impl DurableTier {
    /// Builds the tier from configuration.
    ///
    /// Endpoint, region and static credentials are all optional: without
    /// explicit credentials the SDK falls back to its ambient provider
    /// chain (environment, profile, instance role).
    pub async fn from_settings(settings: &DurableTierSettings) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()));

        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        if let (Some(key), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "fonobox-config",
            ));
        }

        let sdk_config = loader.load().await;

        // Path-style addressing, required by most S3-compatible stores
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
            prefix: settings.prefix.trim_matches('/').to_string(),
        })
    }

    fn key(&self, locator: &str) -> String {
        if self.prefix.is_empty() {
            locator.to_string()
        } else {
            format!("{}/{}", self.prefix, locator)
        }
    }
}

#[async_trait]
impl StorageTier for DurableTier {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn exists(&self, locator: &str) -> Result<bool> {
        validate_locator(locator)?;
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.key(locator))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Durable(service.to_string()))
                }
            }
        }
    }

    async fn open(&self, locator: &str) -> Result<Option<TierObject>> {
        validate_locator(locator)?;
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(locator))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    return Ok(None);
                }
                return Err(StoreError::Durable(service.to_string()));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Durable(e.to_string()))?
            .into_bytes();

        debug!(locator = %locator, size = data.len(), "Fetched object from durable tier");
        Ok(Some(TierObject::Buffer(data)))
    }

    async fn put(&self, locator: &str, source: &Path) -> Result<()> {
        validate_locator(locator)?;
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StoreError::Durable(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(locator))
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Durable(e.to_string()))?;

        debug!(locator = %locator, bucket = %self.bucket, "Uploaded object to durable tier");
        Ok(())
    }
}
