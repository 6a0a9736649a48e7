use anyhow::{Context, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_smithy_http_client::tls::rustls_provider::CryptoMode;
use aws_smithy_http_client::tls::{self, TlsContext, TrustStore};
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::s3::store::{DeleteBatch, ObjectStore, StoreError, UploadObject};

/// `DeleteObjects` accepts at most this many keys per request.
const MAX_DELETE_KEYS: usize = 1000;

/// Creates an S3 client from the region, profile, endpoint and CA settings
/// of the configuration. Anything left unset falls back to the SDK's default
/// provider chain.
pub async fn create_s3_client(config: &SyncConfig) -> anyhow::Result<Client> {
    let mut loader = aws_config::from_env();

    if let Some(region) = non_empty(config.region.as_deref()) {
        info!("aws sdk config: using region: {}", region);
        loader = loader.region(Region::new(region.to_string()));
    }

    if let Some(profile) = non_empty(config.profile.as_deref()) {
        info!("aws sdk config: using profile: {}", profile);
        loader = loader.profile_name(profile);
    }

    if let Some(cafile) = config.cafile.as_deref().filter(|p| !p.as_os_str().is_empty()) {
        info!("aws sdk config: handling self signed cert: {}", cafile.display());
        let pem = std::fs::read(cafile)
            .with_context(|| format!("failed to read CA file {}", cafile.display()))?;
        let trust_store = TrustStore::empty()
            .with_native_roots(true)
            .with_pem_certificate(pem);
        let tls_context = TlsContext::builder()
            .with_trust_store(trust_store)
            .build()
            .map_err(|e| anyhow!("invalid CA file {}: {}", cafile.display(), e))?;
        let http_client = aws_smithy_http_client::Builder::new()
            .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc))
            .tls_context(tls_context)
            .build_https();
        loader = loader.http_client(http_client);
    }

    let shared = loader.load().await;
    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(endpoint) = non_empty(config.endpoint_url.as_deref()) {
        info!("aws sdk config: using endpoint: {}", endpoint);
        builder = builder.endpoint_url(endpoint);
    }
    builder = builder.force_path_style(config.force_path_style);

    Ok(Client::from_conf(builder.build()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn backend_error(err: &impl std::error::Error) -> StoreError {
    StoreError::Backend(DisplayErrorContext(err).to_string())
}

/// [`ObjectStore`] backed by the AWS SDK.
pub struct S3Store {
    client: Client,
    cache_control: Option<String>,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache_control: None,
        }
    }

    /// Sets the `Cache-Control` header sent with every put.
    pub fn with_cache_control(mut self, cache_control: Option<String>) -> Self {
        self.cache_control = cache_control.filter(|v| !v.trim().is_empty());
        self
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| {
                let missing = err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_bucket() || e.code() == Some("NoSuchBucket"));
                if missing {
                    StoreError::NoSuchBucket {
                        bucket: bucket.to_string(),
                    }
                } else {
                    backend_error(&err)
                }
            })?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .map(str::to_string),
            );
        }
        debug!("Listed {} object(s) in {}", keys.len(), bucket);
        Ok(keys)
    }

    async fn put_object(&self, bucket: &str, object: UploadObject) -> Result<(), StoreError> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(&object.key)
            .content_type(&object.content_type)
            .body(ByteStream::from(object.body));
        if let Some(cache_control) = &self.cache_control {
            request = request.cache_control(cache_control);
        }
        request.send().await.map_err(|err| backend_error(&err))?;
        Ok(())
    }

    async fn delete_objects(&self, batch: &DeleteBatch) -> Result<(), StoreError> {
        let keys: Vec<&String> = batch.keys.iter().collect();
        for chunk in keys.chunks(MAX_DELETE_KEYS) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key.as_str()).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| backend_error(&err))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|err| backend_error(&err))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&batch.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| backend_error(&err))?;

            let failed: Vec<String> = output
                .errors()
                .iter()
                .map(|e| {
                    format!(
                        "{} ({})",
                        e.key().unwrap_or("<unknown key>"),
                        e.message().unwrap_or("unknown error")
                    )
                })
                .collect();
            if !failed.is_empty() {
                return Err(StoreError::PartialDelete(failed));
            }
        }
        Ok(())
    }
}
