//! S3-compatible storage driver

use std::env;
use std::fmt;

use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;

use crate::error::{Error, Result};
use crate::models::ItemId;

use super::{storage_error, ContentDriver};

const ENV_BUCKET: &str = "SILT_S3_BUCKET";
const ENV_REGION: &str = "SILT_S3_REGION";
const ENV_ENDPOINT_URL: &str = "SILT_S3_ENDPOINT_URL";
const ENV_ACCESS_KEY_ID: &str = "SILT_S3_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "SILT_S3_SECRET_ACCESS_KEY";

/// Settings for an S3-compatible object store
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,
    /// Region; S3-compatible stores usually accept `auto`
    pub region: String,
    /// Endpoint override for non-AWS stores
    pub endpoint_url: Option<String>,
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl S3Config {
    /// Load S3 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no S3 variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }
}

/// Blob storage in an S3-compatible object store
pub struct S3Driver {
    config: S3Config,
}

impl S3Driver {
    /// Create a driver for the configured bucket
    #[must_use]
    pub const fn new(config: S3Config) -> Self {
        Self { config }
    }

    /// Check that the configured bucket is reachable with current credentials
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        let client = self.client();
        client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, error))?;
        Ok(())
    }

    fn object_key(id: &ItemId) -> String {
        format!("items/{id}")
    }

    fn target(&self, key: &str) -> String {
        format!("{}/{key}", self.config.bucket)
    }

    fn client(&self) -> Client {
        let credentials = Credentials::new(
            self.config.access_key_id.clone(),
            self.config.secret_access_key.clone(),
            None,
            None,
            "silt-core-s3-storage",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .region(Region::new(self.config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true);

        if let Some(endpoint_url) = &self.config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url.clone());
        }

        Client::from_conf(builder.build())
    }
}

#[async_trait::async_trait]
impl ContentDriver for S3Driver {
    async fn write(&self, id: &ItemId, content: &[u8]) -> Result<()> {
        let key = Self::object_key(id);
        self.client()
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .map_err(|error| storage_error("put_object", &self.target(&key), error))?;
        Ok(())
    }

    async fn read(&self, id: &ItemId) -> Result<Vec<u8>> {
        let key = Self::object_key(id);
        let response = self
            .client()
            .get_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|error| storage_error("get_object", &self.target(&key), error))?;

        let payload = response
            .body
            .collect()
            .await
            .map_err(|error| storage_error("get_object_body", &self.target(&key), error))?;

        Ok(payload.into_bytes().to_vec())
    }

    async fn exists(&self, id: &ItemId) -> Result<bool> {
        let key = Self::object_key(id);
        let response = self
            .client()
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(&key)
            .max_keys(1)
            .send()
            .await
            .map_err(|error| storage_error("list_objects_v2", &self.target(&key), error))?;

        Ok(response
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .any(|candidate| candidate == key))
    }

    async fn delete(&self, ids: &[ItemId]) -> Result<()> {
        let client = self.client();
        for id in ids {
            let key = Self::object_key(id);
            client
                .delete_object()
                .bucket(&self.config.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|error| storage_error("delete_object", &self.target(&key), error))?;
        }
        Ok(())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<S3Config>> {
    let bucket = lookup(ENV_BUCKET).map(|value| value.trim().to_string());
    let region = lookup(ENV_REGION).map(|value| value.trim().to_string());
    let endpoint_url = lookup(ENV_ENDPOINT_URL).map(|value| value.trim().to_string());
    let access_key_id = lookup(ENV_ACCESS_KEY_ID).map(|value| value.trim().to_string());
    let secret_access_key = lookup(ENV_SECRET_ACCESS_KEY).map(|value| value.trim().to_string());

    let any_present = bucket.is_some()
        || region.is_some()
        || endpoint_url.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some();

    if !any_present {
        return Ok(None);
    }

    let mut missing = Vec::new();
    if bucket.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_BUCKET);
    }
    if access_key_id.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_ACCESS_KEY_ID);
    }
    if secret_access_key.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_SECRET_ACCESS_KEY);
    }

    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "S3 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    let endpoint_url = match endpoint_url.filter(|value| !value.is_empty()) {
        Some(value) if value.starts_with("https://") || value.starts_with("http://") => {
            Some(value.trim_end_matches('/').to_string())
        }
        Some(_) => {
            return Err(Error::Validation(format!(
                "{ENV_ENDPOINT_URL} must start with http:// or https://"
            )))
        }
        None => None,
    };

    Ok(Some(S3Config {
        bucket: bucket.expect("validated above"),
        region: region.filter(|value| !value.is_empty()).unwrap_or_else(|| "auto".to_string()),
        endpoint_url,
        access_key_id: access_key_id.expect("validated above"),
        secret_access_key: secret_access_key.expect("validated above"),
    }))
}
