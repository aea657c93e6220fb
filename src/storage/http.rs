// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP remote: one URL, `GET` to fetch, `PUT` or `POST` to replace.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::traits::RemoteStore;
use crate::config::{DocStoreConfig, RemoteMethod};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    url: String,
    method: RemoteMethod,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl HttpRemote {
    /// Build from the remote settings in `config`. Fails without a
    /// `remote_url` or when a configured header is not valid HTTP.
    pub fn from_config(config: &DocStoreConfig) -> Result<Self, StoreError> {
        let url = config
            .remote_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| StoreError::Configuration("remote_url is required for an HTTP remote".into()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.remote_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| StoreError::Configuration(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| StoreError::Configuration(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Configuration(format!("http client build failed: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
            method: config.remote_method,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn transport_error(operation: &'static str, err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout { operation }
    } else {
        StoreError::Transport {
            operation,
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport_error("fetch", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %self.url, "Remote has no document");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                operation: "fetch",
                code: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| transport_error("fetch", e))?;
        debug!(url = %self.url, bytes = body.len(), "Fetched remote document");
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(body.to_vec()))
    }

    async fn store(&self, body: Vec<u8>) -> Result<(), StoreError> {
        let request = match self.method {
            RemoteMethod::Put => self.client.put(&self.url),
            RemoteMethod::Post => self.client.post(&self.url),
        };
        let bytes = body.len();
        let response = request
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.write_timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error("store", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                operation: "store",
                code: status.as_u16(),
            });
        }
        debug!(url = %self.url, bytes, status = status.as_u16(), "Stored remote document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_url() {
        let err = HttpRemote::from_config(&DocStoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn test_rejects_bad_header() {
        let mut config = DocStoreConfig {
            remote_url: Some("http://127.0.0.1:1/doc".into()),
            ..Default::default()
        };
        config.remote_headers.insert("bad header".into(), "v".into());
        assert!(matches!(
            HttpRemote::from_config(&config),
            Err(StoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_trims_url() {
        let config = DocStoreConfig {
            remote_url: Some(" http://127.0.0.1:1/doc ".into()),
            ..Default::default()
        };
        assert_eq!(HttpRemote::from_config(&config).unwrap().url(), "http://127.0.0.1:1/doc");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 1 on loopback is reserved and never listening.
        let config = DocStoreConfig {
            remote_url: Some("http://127.0.0.1:1/doc".into()),
            read_timeout_ms: 2000,
            ..Default::default()
        };
        let remote = HttpRemote::from_config(&config).unwrap();
        let err = remote.fetch().await.unwrap_err();
        assert!(err.is_retryable(), "got {err:?}");
    }
}
