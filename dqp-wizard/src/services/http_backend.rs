//! HTTP implementation of the backend seam
//!
//! Thin JSON client over the pipeline's REST API. Every non-success status
//! maps to a typed error so callers never inspect raw status codes.

use crate::services::backend::DqBackend;
use async_trait::async_trait;
use dqp_common::api::{
    ColumnProfile, ColumnsResponse, FileRecord, JobStatusReport, ProcessingRequest,
    ProfileBatchRequest, ProfileBatchResponse, SettingsPreset, SubmitAccepted,
    SuggestionRequest, SuggestionResponse,
};
use dqp_common::{Error, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

const USER_AGENT: &str = concat!("DQPilot/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the DQ pipeline backend
pub struct HttpBackend {
    base_url: String,
    http_client: reqwest::Client,
    auth_token: Option<String>,
}

impl HttpBackend {
    /// Create a client for the given base URL.
    ///
    /// The token, when present, is sent as a bearer Authorization header on
    /// every request.
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            auth_token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http_client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode a JSON response body
    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(response.text().await.unwrap_or_default()));
        }
        if status == StatusCode::BAD_REQUEST {
            return Err(Error::InvalidInput(
                response.text().await.unwrap_or_default(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Api {
                status: status.as_u16(),
                message: format!("Malformed response body: {}", e),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(self.request(Method::GET, path)).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(self.request(Method::POST, path).json(body))
            .await
    }
}

#[async_trait]
impl DqBackend for HttpBackend {
    async fn discover_columns(&self, upload_id: Uuid) -> Result<Vec<String>> {
        tracing::debug!(upload_id = %upload_id, "Discovering columns");
        let response: ColumnsResponse = self
            .get_json(&format!("/uploads/{}/columns", upload_id))
            .await?;
        Ok(response.columns)
    }

    async fn profile_columns(
        &self,
        upload_id: Uuid,
        columns: &[String],
        sample_size: usize,
    ) -> Result<BTreeMap<String, ColumnProfile>> {
        tracing::debug!(
            upload_id = %upload_id,
            columns = columns.len(),
            sample_size = sample_size,
            "Requesting column profiles"
        );
        let request = ProfileBatchRequest {
            columns: columns.to_vec(),
            sample_size,
        };
        let response: ProfileBatchResponse = self
            .post_json(&format!("/uploads/{}/profiles", upload_id), &request)
            .await?;
        Ok(response.profiles)
    }

    async fn list_presets(&self) -> Result<Vec<SettingsPreset>> {
        self.get_json("/presets").await
    }

    async fn get_preset(&self, preset_id: &str) -> Result<SettingsPreset> {
        self.get_json(&format!("/presets/{}", preset_id)).await
    }

    async fn create_preset(&self, preset: &SettingsPreset) -> Result<SettingsPreset> {
        self.post_json("/presets", preset).await
    }

    async fn update_preset(&self, preset: &SettingsPreset) -> Result<SettingsPreset> {
        self.send_json(
            self.request(Method::PUT, &format!("/presets/{}", preset.preset_id))
                .json(preset),
        )
        .await
    }

    async fn delete_preset(&self, preset_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/presets/{}", preset_id))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn submit_job(
        &self,
        upload_id: Uuid,
        request: &ProcessingRequest,
    ) -> Result<SubmitAccepted> {
        tracing::info!(upload_id = %upload_id, "Submitting processing job");
        self.post_json(&format!("/uploads/{}/process", upload_id), request)
            .await
    }

    async fn job_status(&self, upload_id: Uuid) -> Result<JobStatusReport> {
        self.get_json(&format!("/uploads/{}/status", upload_id))
            .await
    }

    async fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.get_json("/uploads").await
    }

    async fn suggest_rule(
        &self,
        upload_id: Uuid,
        request: &SuggestionRequest,
    ) -> Result<SuggestionResponse> {
        tracing::debug!(
            upload_id = %upload_id,
            column = %request.column,
            "Requesting custom rule suggestion"
        );
        self.post_json(&format!("/uploads/{}/rules/suggest", upload_id), request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_strips_trailing_slash() {
        let backend = HttpBackend::new("http://pipeline:8800/", None).unwrap();
        assert_eq!(backend.base_url, "http://pipeline:8800");
    }
}
