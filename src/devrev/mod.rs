//! Work-tracking API client: opportunity listing and timeline comments.

pub mod fetch;
pub mod types;

use chrono::{DateTime, Utc};
use serde_json::json;
use url::Url;

use crate::error::{Error, Result};
use self::types::{OpportunityRecord, TimelineEntryResponse, WorksListResponse};

/// Client for the work-tracking API, authenticated with a per-event
/// bearer credential.
#[derive(Debug, Clone)]
pub struct DevRevClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl DevRevClient {
    pub fn new(endpoint: &str, token: &str) -> Result<Self> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {endpoint}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid API path {path}: {e}")))
    }

    /// List work items of the given type, up to `limit` records.
    pub async fn list_works(&self, work_type: &str, limit: u32) -> Result<Vec<OpportunityRecord>> {
        let url = self.url("works.list")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .header("X-DevRev-Scope", "beta")
            .query(&[("limit", limit.to_string().as_str()), ("type", work_type)])
            .send()
            .await
            .map_err(|e| Error::UpstreamFetch(format!("works.list request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamFetch(format!(
                "works.list returned HTTP {status}: {body}"
            )));
        }

        // Decode in two steps so a shape mismatch reports the payload
        // problem rather than a generic decode failure.
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::UpstreamFetch(format!("works.list returned non-JSON: {e}")))?;
        let parsed: WorksListResponse = serde_json::from_value(value)
            .map_err(|e| Error::UpstreamFetch(format!("unexpected works.list payload: {e}")))?;
        Ok(parsed.works)
    }

    /// Post a timeline comment on a work item. When `existing_id` is
    /// given the comment is updated in place; otherwise a new internal
    /// comment is created, optionally expiring at `expires_at`.
    pub async fn post_comment(
        &self,
        object: &str,
        body: &str,
        existing_id: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<String> {
        match existing_id {
            Some(id) => {
                let url = self.url("timeline-entries.update")?;
                let payload = json!({
                    "id": id,
                    "type": "timeline_comment",
                    "body": body,
                });
                let response = self.request(url, &payload).await?;
                Ok(response.timeline_entry.id)
            }
            None => {
                let url = self.url("timeline-entries.create")?;
                let mut payload = json!({
                    "object": object,
                    "type": "timeline_comment",
                    "body": body,
                    "body_type": "text",
                    "visibility": "internal",
                });
                if let Some(expiry) = expires_at {
                    payload["expires_at"] = json!(expiry.to_rfc3339());
                }
                let response = self.request(url, &payload).await?;
                Ok(response.timeline_entry.id)
            }
        }
    }

    async fn request(&self, url: Url, payload: &serde_json::Value) -> Result<TimelineEntryResponse> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "timeline request returned HTTP {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Other(format!("unexpected timeline payload: {e}")))
    }
}
