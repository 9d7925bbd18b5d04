//! Chat platform client: channel resolution, file upload, message post.

use serde::Deserialize;

use crate::error::{Error, Result};

const SLACK_API_URL: &str = "https://slack.com/api";

/// Fixed attachment name for the uploaded report.
pub const REPORT_FILENAME: &str = "Business_Opportunities_Report.pdf";
/// Title shown next to the attachment.
pub const REPORT_TITLE: &str = "Business Opportunities Report";

/// One channel from `conversations.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelsListResponse {
    ok: bool,
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Outcome of one delivery attempt. An unsuccessful upload (`ok ==
/// false`) is an ordinary result the pipeline reports back to the
/// thread; only transport and auth failures become errors.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub ok: bool,
    pub error: Option<String>,
}

impl DeliveryResult {
    fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: SLACK_API_URL.to_string(),
            token: token.to_string(),
        }
    }

    /// Point at a different API root (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>> {
        let response = self
            .http
            .get(format!("{}/conversations.list", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("conversations.list request failed: {e}")))?;
        let parsed: ChannelsListResponse = response
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("unexpected conversations.list payload: {e}")))?;
        if !parsed.ok {
            return Err(Error::Delivery(format!(
                "conversations.list failed: {}",
                parsed.error.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(parsed.channels)
    }

    /// Resolve a display name to a channel id by exact match.
    pub async fn find_channel_id(&self, channel_name: &str) -> Result<String> {
        let channels = self.list_channels().await?;
        channels
            .into_iter()
            .find(|channel| channel.name == channel_name)
            .map(|channel| channel.id)
            .ok_or_else(|| Error::ChannelNotFound(channel_name.to_string()))
    }

    /// Join a channel. Joining a channel the bot is already in is a
    /// no-op on the platform side, so failures here are logged only.
    pub async fn join_channel(&self, channel_id: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/conversations.join", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "channel": channel_id }))
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("conversations.join request failed: {e}")))?;
        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("unexpected conversations.join payload: {e}")))?;
        if !parsed.ok {
            log::warn!(
                "conversations.join returned {}",
                parsed.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }

    pub async fn upload_file(
        &self,
        channel_id: &str,
        bytes: Vec<u8>,
        filename: &str,
        title: &str,
    ) -> Result<DeliveryResult> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| Error::Delivery(format!("invalid upload part: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("channels", channel_id.to_string())
            .text("filename", filename.to_string())
            .text("title", title.to_string())
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/files.upload", self.base_url))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("files.upload request failed: {e}")))?;
        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("unexpected files.upload payload: {e}")))?;
        if parsed.ok {
            Ok(DeliveryResult::success())
        } else {
            Ok(DeliveryResult {
                ok: false,
                error: parsed.error,
            })
        }
    }

    pub async fn post_message(&self, channel_id: &str, text: &str) -> Result<DeliveryResult> {
        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "channel": channel_id, "text": text }))
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("chat.postMessage request failed: {e}")))?;
        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("unexpected chat.postMessage payload: {e}")))?;
        Ok(DeliveryResult {
            ok: parsed.ok,
            error: parsed.error,
        })
    }

    /// Full delivery path for the rendered PDF: resolve the channel,
    /// join it, upload the attachment.
    pub async fn deliver_pdf(&self, channel_name: &str, bytes: Vec<u8>) -> Result<DeliveryResult> {
        let channel_id = self.find_channel_id(channel_name).await?;
        self.join_channel(&channel_id).await?;
        self.upload_file(&channel_id, bytes, REPORT_FILENAME, REPORT_TITLE)
            .await
    }

    /// Degraded delivery path: post the summary as a plain message.
    pub async fn deliver_text(&self, channel_name: &str, text: &str) -> Result<DeliveryResult> {
        let channel_id = self.find_channel_id(channel_name).await?;
        self.join_channel(&channel_id).await?;
        self.post_message(&channel_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn channels_body() -> serde_json::Value {
        serde_json::json!({
            "ok": true,
            "channels": [
                { "id": "C01GENERAL", "name": "general" },
                { "id": "C02SALES", "name": "sales-updates" }
            ]
        })
    }

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::new("xoxb-test").with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_find_channel_id_exact_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channels_body()))
            .mount(&server)
            .await;

        let id = client(&server).find_channel_id("general").await.unwrap();
        assert_eq!(id, "C01GENERAL");
    }

    #[tokio::test]
    async fn test_find_channel_id_missing_is_channel_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channels_body()))
            .mount(&server)
            .await;

        match client(&server).find_channel_id("announcements").await {
            Err(Error::ChannelNotFound(name)) => assert_eq!(name, "announcements"),
            other => panic!("expected ChannelNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_find_channel_id_no_partial_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channels_body()))
            .mount(&server)
            .await;

        assert!(client(&server).find_channel_id("gener").await.is_err());
    }

    #[tokio::test]
    async fn test_list_channels_api_error_is_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false, "error": "invalid_auth"
            })))
            .mount(&server)
            .await;

        match client(&server).list_channels().await {
            Err(Error::Delivery(msg)) => assert!(msg.contains("invalid_auth")),
            other => panic!("expected Delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deliver_pdf_uploads_after_join() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channels_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations.join"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .deliver_pdf("general", b"%PDF-1.3 fake".to_vec())
            .await
            .unwrap();
        assert!(result.ok);
    }

    #[tokio::test]
    async fn test_upload_rejection_is_result_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channels_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations.join"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false, "error": "file_upload_disabled"
            })))
            .mount(&server)
            .await;

        let result = client(&server)
            .deliver_pdf("general", b"%PDF-1.3 fake".to_vec())
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("file_upload_disabled"));
    }

    #[tokio::test]
    async fn test_deliver_text_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channels_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations.join"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .deliver_text("sales-updates", "Two deals closed.")
            .await
            .unwrap();
        assert!(result.ok);
    }
}
