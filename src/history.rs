// SPDX-License-Identifier: GPL-3.0-only

//! Scan history persistence
//!
//! Results of signed-in users are written to a remote history service
//! together with the scanned image. Failures here are logged by the
//! caller and never undo a completed scan.

use crate::app::UserIdentity;
use crate::constants::endpoints::HISTORY_SAVE_ACTION;
use crate::errors::PersistenceError;
use crate::pipelines::analyze::AnalysisResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Key under which the scanned image is stored
pub const SCAN_IMAGE_KEY: &str = "scanImage";

/// Key wrapping results that are not JSON objects
pub const RESULT_KEY: &str = "result";

/// One history entry: the analysis fields plus the scanned image
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HistoryRecord(Map<String, Value>);

impl HistoryRecord {
    /// Merge the image into the result's fields
    ///
    /// Object results are extended in place (an existing `scanImage` is
    /// replaced); anything else is nested under `result`.
    pub fn from_result(result: &AnalysisResult, scan_image: &str) -> Self {
        let mut fields = match result.as_json() {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert(RESULT_KEY.to_string(), other.clone());
                map
            }
        };
        fields.insert(
            SCAN_IMAGE_KEY.to_string(),
            Value::String(scan_image.to_string()),
        );
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    action: &'static str,
    data: &'a HistoryRecord,
}

/// Where completed scans are stored
#[async_trait]
pub trait HistoryService: Send + Sync {
    async fn save(&self, user: &UserIdentity, record: HistoryRecord)
    -> Result<(), PersistenceError>;
}

/// History service reached over HTTP
pub struct HttpHistoryService {
    url: String,
    client: Client,
}

impl HttpHistoryService {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, PersistenceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl HistoryService for HttpHistoryService {
    async fn save(
        &self,
        user: &UserIdentity,
        record: HistoryRecord,
    ) -> Result<(), PersistenceError> {
        info!(user = %user.id, url = %self.url, "Saving scan to history");

        let body = SaveRequest {
            action: HISTORY_SAVE_ACTION,
            data: &record,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &user.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PersistenceError::Status(status.as_u16()));
        }

        debug!(user = %user.id, "History entry stored");
        Ok(())
    }
}
