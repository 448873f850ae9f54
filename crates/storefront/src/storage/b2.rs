//! Backblaze B2 native API client.
//!
//! Uploading takes three calls before the file itself: authorize the account,
//! resolve the bucket name to an id, and fetch an upload URL. The first two
//! are cached for most of the authorization token's 24 hour lifetime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::{ObjectStorage, StorageError};
use crate::config::StorageConfig;

/// Authorized account plus resolved bucket.
#[derive(Debug, Clone)]
struct B2Session {
    authorization_token: String,
    api_url: String,
    download_url: String,
    bucket_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
    account_id: String,
    authorization_token: String,
    api_url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bucket {
    bucket_id: String,
    bucket_name: String,
}

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

/// Client for Backblaze B2.
#[derive(Clone)]
pub struct B2Client {
    inner: Arc<B2ClientInner>,
}

struct B2ClientInner {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    application_key: String,
    bucket: String,
    session: Cache<(), B2Session>,
}

impl B2Client {
    /// Create a new B2 client. No request is made until the first upload.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        let session = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(23 * 60 * 60))
            .build();

        Self {
            inner: Arc::new(B2ClientInner {
                client: reqwest::Client::new(),
                api_base: config.api_base.trim_end_matches('/').to_owned(),
                key_id: config.key_id.clone(),
                application_key: config.application_key.expose_secret().to_owned(),
                bucket: config.bucket.clone(),
                session,
            }),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, StorageError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "B2 returned non-success status");
            return Err(StorageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| StorageError::Api {
            status: status.as_u16(),
            message: format!("unreadable response: {e}"),
        })
    }

    /// Authorize and resolve the bucket, bypassing the cache.
    async fn open_session(&self) -> Result<B2Session, StorageError> {
        let inner = &self.inner;

        let response = inner
            .client
            .get(format!("{}/b2api/v2/b2_authorize_account", inner.api_base))
            .basic_auth(&inner.key_id, Some(&inner.application_key))
            .send()
            .await?;
        let auth: AuthorizeResponse = Self::parse(response).await?;

        let response = inner
            .client
            .post(format!("{}/b2api/v2/b2_list_buckets", auth.api_url))
            .header("Authorization", &auth.authorization_token)
            .json(&json!({ "accountId": auth.account_id, "bucketName": inner.bucket }))
            .send()
            .await?;
        let listed: ListBucketsResponse = Self::parse(response).await?;

        let bucket = listed
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == inner.bucket)
            .ok_or_else(|| StorageError::BucketNotFound(inner.bucket.clone()))?;

        tracing::debug!(bucket_id = %bucket.bucket_id, "Authorized B2 account");
        Ok(B2Session {
            authorization_token: auth.authorization_token,
            api_url: auth.api_url,
            download_url: auth.download_url,
            bucket_id: bucket.bucket_id,
        })
    }

    async fn session(&self) -> Result<B2Session, StorageError> {
        if let Some(session) = self.inner.session.get(&()).await {
            return Ok(session);
        }
        let session = self.open_session().await?;
        self.inner.session.insert((), session.clone()).await;
        Ok(session)
    }

    async fn try_upload(
        &self,
        session: &B2Session,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let response = self
            .inner
            .client
            .post(format!("{}/b2api/v2/b2_get_upload_url", session.api_url))
            .header("Authorization", &session.authorization_token)
            .json(&json!({ "bucketId": session.bucket_id }))
            .send()
            .await?;
        let target: UploadUrlResponse = Self::parse(response).await?;

        let response = self
            .inner
            .client
            .post(&target.upload_url)
            .header("Authorization", &target.authorization_token)
            .header("X-Bz-File-Name", urlencoding::encode(object_name).as_ref())
            .header("Content-Type", content_type)
            .header("X-Bz-Content-Sha1", "do_not_verify")
            .body(bytes)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::parse(response).await?;

        Ok(public_url(&session.download_url, &self.inner.bucket, &uploaded.file_name))
    }
}

fn public_url(download_url: &str, bucket: &str, file_name: &str) -> String {
    format!(
        "{}/file/{bucket}/{}",
        download_url.trim_end_matches('/'),
        urlencoding::encode(file_name)
    )
}

#[async_trait]
impl ObjectStorage for B2Client {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let session = self.session().await?;

        match self.try_upload(&session, object_name, content_type, bytes).await {
            Ok(url) => {
                tracing::info!(url = %url, "Uploaded image");
                Ok(url)
            }
            Err(e) => {
                // Expired or revoked tokens are re-authorized on the next upload.
                if matches!(e, StorageError::Api { status: 401, .. }) {
                    self.inner.session.invalidate(&()).await;
                }
                Err(e)
            }
        }
    }
}
