//! HTTP object store: `HEAD`/`PUT` on `<endpoint>/<bucket>/<key>`.
//!
//! Works against any endpoint with path-style object URLs, such as an
//! S3-compatible gateway or a presigning proxy.

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use tracing::debug;

use super::{ArtifactStore, StoreError, validate_key};

#[derive(Debug, Clone)]
pub struct HttpStore {
  endpoint: String,
  token: Option<String>,
  client: reqwest::Client,
}

impl HttpStore {
  pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, StoreError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("layerpack/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| StoreError::InvalidLocation {
        location: endpoint.to_string(),
        message: e.to_string(),
      })?;

    Ok(Self {
      endpoint: endpoint.trim_end_matches('/').to_string(),
      token,
      client,
    })
  }

  pub fn object_url(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
    validate_key(bucket)?;
    validate_key(key)?;
    Ok(format!("{}/{}/{}", self.endpoint, bucket, key))
  }

  fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
      None => request,
    }
  }
}

#[async_trait]
impl ArtifactStore for HttpStore {
  async fn exists(&self, bucket: &str, key: &str, _out_dir: &Path) -> Result<Option<u64>, StoreError> {
    let url = self.object_url(bucket, key)?;
    let response = self
      .authorize(self.client.head(&url))
      .send()
      .await
      .map_err(|e| StoreError::Request {
        url: url.clone(),
        message: e.to_string(),
      })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      debug!(url = %url, "object not found");
      return Ok(None);
    }
    if !status.is_success() {
      return Err(StoreError::Status {
        method: "HEAD".to_string(),
        url,
        status: status.as_u16(),
      });
    }

    let size = response
      .headers()
      .get(CONTENT_LENGTH)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.parse::<u64>().ok())
      .unwrap_or(0);

    debug!(url = %url, size, "object exists");
    Ok(Some(size))
  }

  async fn publish(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
    let url = self.object_url(bucket, key)?;
    let body = tokio::fs::read(local_path).await.map_err(|source| StoreError::Io {
      path: local_path.to_path_buf(),
      source,
    })?;
    let size = body.len();

    let response = self
      .authorize(self.client.put(&url))
      .header(CONTENT_TYPE, "application/zip")
      .body(body)
      .send()
      .await
      .map_err(|e| StoreError::Request {
        url: url.clone(),
        message: e.to_string(),
      })?;

    if !response.status().is_success() {
      return Err(StoreError::Status {
        method: "PUT".to_string(),
        url,
        status: response.status().as_u16(),
      });
    }

    debug!(url = %url, size, "uploaded object");
    Ok(())
  }
}
