// SPDX-License-Identifier: GPL-3.0-only

//! Remote analysis endpoints

use crate::errors::AnalysisError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// JSON body posted to an analysis endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// `data:image/jpeg;base64,...`
    pub image: String,
}

impl AnalysisRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

/// Opaque analysis payload returned by the service
///
/// The scanner never looks inside; ownership passes to the listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(pub serde_json::Value);

impl AnalysisResult {
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for AnalysisResult {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Something that can analyze a scan payload
#[async_trait]
pub trait AnalysisEndpoint: Send + Sync {
    /// Short name used in logs and errors ("primary", "fallback")
    fn name(&self) -> &str;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

/// JSON-over-HTTP analysis endpoint
pub struct HttpAnalysisEndpoint {
    name: String,
    url: String,
    client: Client,
}

impl HttpAnalysisEndpoint {
    /// Build an endpoint; `timeout` bounds the whole request when set
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, AnalysisError> {
        let name = name.into();
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| AnalysisError::Transport {
            endpoint: name.clone(),
            message: format!("failed to build HTTP client: {}", e),
        })?;

        Ok(Self {
            name,
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnalysisEndpoint for HttpAnalysisEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        info!(endpoint = %self.name, url = %self.url, bytes = request.image.len(), "Posting scan");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport {
                endpoint: self.name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status {
                endpoint: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| AnalysisError::Transport {
            endpoint: self.name.clone(),
            message: format!("failed to read response: {}", e),
        })?;

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| AnalysisError::InvalidResponse {
                endpoint: self.name.clone(),
                message: e.to_string(),
            })?;

        debug!(endpoint = %self.name, status = status.as_u16(), "Analysis response received");
        Ok(AnalysisResult(value))
    }
}
