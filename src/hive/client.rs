//! HTTP client for TheHive.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::model::{Alert, Case, CreatedAlert, CreatedCase};
use super::HiveError;
use crate::config::HiveConfig;

/// The case-management calls the pipeline depends on.
#[async_trait::async_trait]
pub trait CaseApi: Send + Sync {
    async fn create_case(&self, case: &Case) -> Result<CreatedCase, HiveError>;
    async fn create_alert(&self, alert: &Alert) -> Result<CreatedAlert, HiveError>;
    async fn promote_alert_to_case(&self, alert_id: &str) -> Result<CreatedCase, HiveError>;
    async fn merge_alerts_into_case(
        &self,
        case_id: &str,
        alert_ids: &[String],
    ) -> Result<(), HiveError>;
    /// Update only the `tags` field of an existing case.
    async fn update_case_tags(&self, case_id: &str, tags: &[String]) -> Result<(), HiveError>;
}

/// reqwest-backed [`CaseApi`] with bearer authentication.
pub struct HiveClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HiveClient {
    pub fn new(config: &HiveConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HiveError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HiveError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    async fn patch_json<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), HiveError> {
        let response = self
            .http
            .patch(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HiveError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CaseApi for HiveClient {
    async fn create_case(&self, case: &Case) -> Result<CreatedCase, HiveError> {
        self.post_json("/api/case", case).await
    }

    async fn create_alert(&self, alert: &Alert) -> Result<CreatedAlert, HiveError> {
        self.post_json("/api/alert", alert).await
    }

    async fn promote_alert_to_case(&self, alert_id: &str) -> Result<CreatedCase, HiveError> {
        self.post_json(&format!("/api/alert/{}/createCase", alert_id), &json!({}))
            .await
    }

    async fn merge_alerts_into_case(
        &self,
        case_id: &str,
        alert_ids: &[String],
    ) -> Result<(), HiveError> {
        let body = json!({ "caseId": case_id, "alertIds": alert_ids });
        // The bulk endpoint answers with the merged case; only the status
        // matters here.
        let _: serde_json::Value = self.post_json("/api/alert/merge/_bulk", &body).await?;
        Ok(())
    }

    async fn update_case_tags(&self, case_id: &str, tags: &[String]) -> Result<(), HiveError> {
        self.patch_json(&format!("/api/case/{}", case_id), &json!({ "tags": tags }))
            .await
    }
}
