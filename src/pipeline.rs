//! Per-event report pipeline: parse, fetch, summarize, render, deliver.
//!
//! One event is one report. A batch of events runs strictly
//! sequentially; a failure in one event never aborts the rest. Errors
//! the user can act on (bad input, unknown channel, empty window,
//! rejected upload) become a message on the triggering thread; anything
//! else is logged and returned to the invoking harness.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::config::{self, Event, ResolvedConfig};
use crate::devrev::fetch::fetch_closed_opportunities;
use crate::devrev::DevRevClient;
use crate::error::{Error, Result};
use crate::input::{self, Defaults};
use crate::llm::summary::summarize;
use crate::llm::LlmClient;
use crate::metrics::OwnerAggregates;
use crate::report;
use crate::report::text;
use crate::slack::SlackClient;

/// Progress notes stay visible this long on the thread.
const PROGRESS_EXPIRY_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Report rendered and accepted by the chat platform.
    Delivered,
    /// A user-visible condition stopped the run; the thread was told.
    Halted,
    /// Unclassified failure, surfaced to the harness.
    Failed,
}

/// Outcome of one event's processing.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub detail: Option<String>,
}

/// Process a batch of events in order. Every event yields a report;
/// unclassified errors are folded into a `Failed` entry so later
/// events still run.
pub async fn run_events(events: &[Event]) -> Vec<RunReport> {
    let mut reports = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        match run_event(event).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                log::error!("event {index}: report generation failed: {e}");
                reports.push(RunReport {
                    status: RunStatus::Failed,
                    detail: Some(e.to_string()),
                });
            }
        }
    }
    reports
}

/// Process one event with collaborator clients built from its own
/// credentials.
pub async fn run_event(event: &Event) -> Result<RunReport> {
    let cfg = config::resolve(event)?;
    let devrev = DevRevClient::new(&cfg.endpoint, &cfg.devrev_token)?;
    let slack = SlackClient::new(&cfg.slack_token);
    let llm = LlmClient::new(&cfg.llm_api_key);
    run_with_clients(&cfg, &devrev, &slack, &llm).await
}

/// Process one event against pre-built clients. Split out from
/// [`run_event`] so collaborators can be pointed elsewhere in tests.
pub async fn run_with_clients(
    cfg: &ResolvedConfig,
    devrev: &DevRevClient,
    slack: &SlackClient,
    llm: &LlmClient,
) -> Result<RunReport> {
    let mut progress = Progress {
        devrev,
        source_id: cfg.source_id.clone(),
        comment_id: None,
    };
    match execute(cfg, devrev, slack, llm, &mut progress).await {
        Ok(report) => Ok(report),
        Err(e) if e.is_user_visible() => {
            let message = user_message(&e);
            progress.notify(&message).await;
            Ok(RunReport {
                status: RunStatus::Halted,
                detail: Some(message),
            })
        }
        Err(e) => {
            log::error!("report generation failed: {e}");
            Err(e)
        }
    }
}

async fn execute(
    cfg: &ResolvedConfig,
    devrev: &DevRevClient,
    slack: &SlackClient,
    llm: &LlmClient,
    progress: &mut Progress<'_>,
) -> Result<RunReport> {
    let defaults = Defaults {
        channel: cfg.default_channel.as_deref(),
        timeframe: cfg.default_timeframe.as_deref(),
    };
    let (target, window) = input::parse(&cfg.parameters, &defaults)?;
    if window.total_hours == 0 {
        return Err(Error::InvalidInput(
            "invalid timeframe: the window must cover at least one hour".into(),
        ));
    }
    if let Some(color) = &target.color {
        log::debug!("requested accent color: {color}");
    }
    log::info!(
        "generating report for #{} over the last {}",
        target.channel,
        window.label()
    );

    progress.step("Connecting with Slack...").await;
    slack.find_channel_id(&target.channel).await?;

    progress.step("Fetching opportunities...").await;
    let records = fetch_closed_opportunities(devrev, window.total_hours).await?;
    if records.is_empty() {
        return Err(Error::EmptyResultSet(window.label()));
    }

    // Pure, so it runs while nothing is in flight; the LLM call below
    // is the only I/O between the two summarizer halves.
    let aggregates = OwnerAggregates::from_records(&records);

    progress.step("Generating summary...").await;
    let summary = summarize(&records, &window.label(), llm).await?;

    let delivery = if cfg.text_only {
        progress.step("Posting summary...").await;
        slack
            .deliver_text(&target.channel, &text::clean(&summary))
            .await?
    } else {
        progress.step("Generating PDF...").await;
        let pdf = report::render(&summary, &aggregates)?;
        progress.step("Uploading report...").await;
        slack.deliver_pdf(&target.channel, pdf).await?
    };

    if delivery.ok {
        progress
            .notify(&format!("Report delivered to #{}.", target.channel))
            .await;
        Ok(RunReport {
            status: RunStatus::Delivered,
            detail: None,
        })
    } else {
        let reason = delivery
            .error
            .unwrap_or_else(|| "unknown delivery error".into());
        progress
            .notify(&format!("Failed to deliver the report: {reason}"))
            .await;
        Ok(RunReport {
            status: RunStatus::Halted,
            detail: Some(reason),
        })
    }
}

fn user_message(error: &Error) -> String {
    match error {
        Error::ChannelNotFound(name) => {
            format!("The channel {name} does not exist or is not accessible.")
        }
        Error::EmptyResultSet(label) => {
            format!("No opportunities closed in the last {label}.")
        }
        Error::Delivery(detail) => format!("Failed to deliver the report: {detail}"),
        Error::InvalidInput(detail) => format!("Could not generate the report: {detail}"),
        other => other.to_string(),
    }
}

/// Best-effort status updates on the triggering thread. Step notes are
/// one expiring comment edited in place; outcome notes are permanent.
/// Posting failures are logged, never escalated.
struct Progress<'a> {
    devrev: &'a DevRevClient,
    source_id: Option<String>,
    comment_id: Option<String>,
}

impl Progress<'_> {
    async fn step(&mut self, message: &str) {
        let Some(source) = self.source_id.as_deref() else {
            log::info!("{message}");
            return;
        };
        let expires_at = Utc::now() + Duration::minutes(PROGRESS_EXPIRY_MINUTES);
        match self
            .devrev
            .post_comment(source, message, self.comment_id.as_deref(), Some(expires_at))
            .await
        {
            Ok(id) => self.comment_id = Some(id),
            Err(e) => log::warn!("failed to post progress note: {e}"),
        }
    }

    async fn notify(&self, message: &str) {
        let Some(source) = self.source_id.as_deref() else {
            log::info!("{message}");
            return;
        };
        if let Err(e) = self.devrev.post_comment(source, message, None, None).await {
            log::warn!("failed to post status message: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(server: &MockServer, parameters: &str) -> ResolvedConfig {
        ResolvedConfig {
            devrev_token: "pat-1".into(),
            slack_token: "xoxb-1".into(),
            llm_api_key: "sk-1".into(),
            endpoint: server.uri(),
            default_channel: Some("sales-updates".into()),
            default_timeframe: Some("24h".into()),
            text_only: false,
            parameters: parameters.into(),
            source_id: None,
        }
    }

    fn clients(server: &MockServer) -> (DevRevClient, SlackClient, LlmClient) {
        (
            DevRevClient::new(&server.uri(), "pat-1").unwrap(),
            SlackClient::new("xoxb-1").with_base_url(server.uri()),
            LlmClient::new("sk-1").with_base_url(format!("{}/v1/chat/completions", server.uri())),
        )
    }

    fn recent_close_date() -> String {
        (Utc::now() - Duration::hours(1)).to_rfc3339()
    }

    fn won_work(id: &str, owner: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": format!("Deal {id}"),
            "actual_close_date": recent_close_date(),
            "owned_by": [ { "full_name": owner } ],
            "stage": { "name": "closed_won" },
            "revenue": 10000.0
        })
    }

    fn channels_body() -> serde_json::Value {
        serde_json::json!({
            "ok": true,
            "channels": [
                { "id": "C01GENERAL", "name": "general" },
                { "id": "C02SALES", "name": "sales-updates" }
            ]
        })
    }

    async fn mount_channels(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channels_body()))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations.join"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .mount(server)
            .await;
    }

    async fn mount_llm(server: &MockServer, content: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": content } } ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_scenario_full_run_delivers_pdf() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "works": [
                    won_work("opp/1", "Lee Chen"),
                    won_work("opp/2", "Dana Ruiz"),
                    won_work("opp/3", "Lee Chen")
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_llm(
            &server,
            serde_json::json!("## Intro\nThree deals closed.\n\n### Conclusion\nStrong day."),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = test_config(&server, "general 24h \u{2705}");
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Delivered);
    }

    #[tokio::test]
    async fn test_scenario_empty_window_halts_before_llm() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "works": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cfg = test_config(&server, "general 24h");
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Halted);
        assert!(report.detail.unwrap().contains("No opportunities closed in the last 1 days"));
    }

    #[tokio::test]
    async fn test_scenario_empty_llm_content_delivers_fallback() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "works": [ won_work("opp/1", "Lee Chen") ]
            })))
            .mount(&server)
            .await;
        mount_llm(&server, serde_json::json!("")).await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = test_config(&server, "general 24h");
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        // "Summary generation failed." is a valid summary; the report
        // still renders and ships.
        assert_eq!(report.status, RunStatus::Delivered);
    }

    #[tokio::test]
    async fn test_scenario_unknown_channel_halts_before_fetch() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cfg = test_config(&server, "announcements 24h");
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Halted);
        assert!(report
            .detail
            .unwrap()
            .contains("The channel announcements does not exist"));
    }

    #[tokio::test]
    async fn test_scenario_default_channel_applied() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "works": [ won_work("opp/1", "Lee Chen") ]
            })))
            .mount(&server)
            .await;
        mount_llm(&server, serde_json::json!("Summary.")).await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        // "1d 2h" carries no channel token: the configured default
        // "sales-updates" is the delivery target.
        let cfg = test_config(&server, "1d 2h");
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Delivered);
    }

    #[tokio::test]
    async fn test_zero_timeframe_halts_with_message() {
        let server = MockServer::start().await;
        let cfg = test_config(&server, "general 0h");
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Halted);
        assert!(report.detail.unwrap().contains("timeframe"));
    }

    #[tokio::test]
    async fn test_rejected_upload_reported_not_raised() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "works": [ won_work("opp/1", "Lee Chen") ]
            })))
            .mount(&server)
            .await;
        mount_llm(&server, serde_json::json!("Summary.")).await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false, "error": "file_upload_disabled"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server, "general 24h");
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Halted);
        assert_eq!(report.detail.as_deref(), Some("file_upload_disabled"));
    }

    #[tokio::test]
    async fn test_text_only_mode_posts_message() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "works": [ won_work("opp/1", "Lee Chen") ]
            })))
            .mount(&server)
            .await;
        mount_llm(&server, serde_json::json!("**Summary.**")).await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = test_config(&server, "general 24h");
        cfg.text_only = true;
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Delivered);
    }

    #[tokio::test]
    async fn test_progress_notes_created_then_edited() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "works": [] })),
            )
            .mount(&server)
            .await;
        // First step creates the note, later steps edit it in place,
        // and the terminal outcome lands as a fresh permanent comment.
        Mock::given(method("POST"))
            .and(path("/timeline-entries.create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timeline_entry": { "id": "don:core:comment/1" }
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/timeline-entries.update"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timeline_entry": { "id": "don:core:comment/1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = test_config(&server, "general 24h");
        cfg.source_id = Some("don:core:work/1".into());
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Halted);
    }

    #[tokio::test]
    async fn test_progress_failures_do_not_escalate() {
        let server = MockServer::start().await;
        mount_channels(&server).await;
        Mock::given(method("GET"))
            .and(path("/works.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "works": [ won_work("opp/1", "Lee Chen") ]
            })))
            .mount(&server)
            .await;
        mount_llm(&server, serde_json::json!("Summary.")).await;
        Mock::given(method("POST"))
            .and(path("/files.upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .mount(&server)
            .await;
        // No timeline mocks: every progress post 404s, which must not
        // stop the run.
        let mut cfg = test_config(&server, "general 24h");
        cfg.source_id = Some("don:core:work/1".into());
        let (devrev, slack, llm) = clients(&server);
        let report = run_with_clients(&cfg, &devrev, &slack, &llm).await.unwrap();
        assert_eq!(report.status, RunStatus::Delivered);
    }

    #[tokio::test]
    async fn test_batch_continues_after_failed_event() {
        // First event lacks every secret, second only the LLM key; both
        // fail during resolution, and both still produce a report entry.
        let events = vec![
            Event::default(),
            serde_json::from_value(serde_json::json!({
                "context": { "secrets": {
                    "service_account_token": "pat-1",
                    "slack_api_token": "xoxb-1"
                } }
            }))
            .unwrap(),
        ];
        let reports = run_events(&events).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].status, RunStatus::Failed);
        assert_eq!(reports[1].status, RunStatus::Failed);
        assert!(reports[1].detail.as_ref().unwrap().contains("llm_api_token"));
    }
}
