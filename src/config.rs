//! Event payload deserialization and credential resolution.
//!
//! Trigger events arrive in two historical shapes: secrets either under
//! `input_data.keyrings` or under `context.secrets`. Resolution follows a
//! fixed precedence: event-provided keyring, then event-provided secret.
//! Channel and timeframe defaults come from `input_data.global_values`.

use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Default API endpoint used when the event carries none.
pub const DEFAULT_ENDPOINT: &str = "https://api.devrev.ai";

/// One trigger event, as delivered by the invoking harness.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub input_data: InputData,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub execution_metadata: ExecutionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputData {
    #[serde(default)]
    pub keyrings: HashMap<String, String>,
    #[serde(default)]
    pub global_values: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payload {
    /// Free-text command argument, e.g. `"general 24h"`.
    #[serde(default)]
    pub parameters: Option<String>,
    /// Work item whose timeline receives progress notes.
    #[serde(default)]
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionMetadata {
    #[serde(default)]
    pub devrev_endpoint: Option<String>,
}

/// Fully resolved per-event configuration. All credential lookups happen
/// here so the pipeline itself never touches raw event maps.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub devrev_token: String,
    pub slack_token: String,
    pub llm_api_key: String,
    pub endpoint: String,
    pub default_channel: Option<String>,
    pub default_timeframe: Option<String>,
    /// Degraded mode: post the cleaned summary as a message instead of a PDF.
    pub text_only: bool,
    pub parameters: String,
    pub source_id: Option<String>,
}

/// Look up a credential by trying each key against the keyrings first,
/// then the secrets map.
fn lookup(event: &Event, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = event.input_data.keyrings.get(*key) {
            if !v.is_empty() {
                return Some(v.clone());
            }
        }
    }
    for key in keys {
        if let Some(v) = event.context.secrets.get(*key) {
            if !v.is_empty() {
                return Some(v.clone());
            }
        }
    }
    None
}

/// Resolve an event into a [`ResolvedConfig`].
///
/// Fails with `InvalidInput` when a required credential is missing and
/// `Config` when the endpoint is not a valid URL.
pub fn resolve(event: &Event) -> Result<ResolvedConfig> {
    let devrev_token = lookup(event, &["service_account_token"]).ok_or_else(|| {
        Error::InvalidInput("missing required secret: service_account_token".into())
    })?;
    let slack_token = lookup(event, &["slack_api_token", "slack_oauth_token"])
        .ok_or_else(|| Error::InvalidInput("missing required secret: slack_api_token".into()))?;
    let llm_api_key = lookup(event, &["llm_api_token"])
        .ok_or_else(|| Error::InvalidInput("missing required secret: llm_api_token".into()))?;

    let endpoint = event
        .execution_metadata
        .devrev_endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    Url::parse(&endpoint).map_err(|e| Error::Config(format!("invalid endpoint {endpoint}: {e}")))?;

    let globals = &event.input_data.global_values;
    let text_only = globals
        .get("text_only")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    Ok(ResolvedConfig {
        devrev_token,
        slack_token,
        llm_api_key,
        endpoint,
        default_channel: globals.get("default_slack_channel").cloned(),
        default_timeframe: globals.get("default_timeframe").cloned(),
        text_only,
        parameters: event.payload.parameters.clone().unwrap_or_default(),
        source_id: event.payload.source_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with(
        secrets: &[(&str, &str)],
        keyrings: &[(&str, &str)],
        globals: &[(&str, &str)],
    ) -> Event {
        let mut event = Event::default();
        for (k, v) in secrets {
            event.context.secrets.insert(k.to_string(), v.to_string());
        }
        for (k, v) in keyrings {
            event
                .input_data
                .keyrings
                .insert(k.to_string(), v.to_string());
        }
        for (k, v) in globals {
            event
                .input_data
                .global_values
                .insert(k.to_string(), v.to_string());
        }
        event
    }

    fn complete_event() -> Event {
        event_with(
            &[("service_account_token", "pat-1")],
            &[("slack_api_token", "xoxb-1"), ("llm_api_token", "sk-1")],
            &[
                ("default_slack_channel", "sales-updates"),
                ("default_timeframe", "24h"),
            ],
        )
    }

    #[test]
    fn test_resolve_complete_event() {
        let cfg = resolve(&complete_event()).unwrap();
        assert_eq!(cfg.devrev_token, "pat-1");
        assert_eq!(cfg.slack_token, "xoxb-1");
        assert_eq!(cfg.llm_api_key, "sk-1");
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.default_channel.as_deref(), Some("sales-updates"));
        assert_eq!(cfg.default_timeframe.as_deref(), Some("24h"));
        assert!(!cfg.text_only);
    }

    #[test]
    fn test_keyring_takes_precedence_over_secret() {
        let event = event_with(
            &[
                ("service_account_token", "pat-1"),
                ("slack_api_token", "from-secrets"),
                ("llm_api_token", "sk-1"),
            ],
            &[("slack_api_token", "from-keyring")],
            &[],
        );
        let cfg = resolve(&event).unwrap();
        assert_eq!(cfg.slack_token, "from-keyring");
    }

    #[test]
    fn test_oauth_token_fallback() {
        let event = event_with(
            &[("service_account_token", "pat-1"), ("llm_api_token", "sk-1")],
            &[("slack_oauth_token", "xoxp-2")],
            &[],
        );
        let cfg = resolve(&event).unwrap();
        assert_eq!(cfg.slack_token, "xoxp-2");
    }

    #[test]
    fn test_secrets_only_shape() {
        let event = event_with(
            &[
                ("service_account_token", "pat-1"),
                ("slack_api_token", "xoxb-1"),
                ("llm_api_token", "sk-1"),
            ],
            &[],
            &[],
        );
        assert!(resolve(&event).is_ok());
    }

    #[test]
    fn test_missing_secret_is_invalid_input() {
        let event = event_with(&[("service_account_token", "pat-1")], &[], &[]);
        match resolve(&event) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("slack_api_token")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_secret_treated_as_missing() {
        let mut event = complete_event();
        event
            .input_data
            .keyrings
            .insert("llm_api_token".into(), String::new());
        event.context.secrets.remove("llm_api_token");
        assert!(resolve(&event).is_err());
    }

    #[test]
    fn test_endpoint_from_event() {
        let mut event = complete_event();
        event.execution_metadata.devrev_endpoint = Some("https://api.dev.devrev-eng.ai".into());
        let cfg = resolve(&event).unwrap();
        assert_eq!(cfg.endpoint, "https://api.dev.devrev-eng.ai");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut event = complete_event();
        event.execution_metadata.devrev_endpoint = Some("not a url".into());
        assert!(matches!(resolve(&event), Err(Error::Config(_))));
    }

    #[test]
    fn test_event_deserializes_from_harness_json() {
        let raw = serde_json::json!({
            "context": { "secrets": { "service_account_token": "pat-1" } },
            "input_data": {
                "keyrings": { "slack_api_token": "xoxb-1", "llm_api_token": "sk-1" },
                "global_values": { "default_slack_channel": "general", "default_timeframe": "2d" }
            },
            "payload": { "parameters": "general 24h", "source_id": "don:core/dvrv-us-1:devo/1:snap_in/2" },
            "execution_metadata": { "devrev_endpoint": "https://api.devrev.ai" }
        });
        let event: Event = serde_json::from_value(raw).unwrap();
        let cfg = resolve(&event).unwrap();
        assert_eq!(cfg.parameters, "general 24h");
        assert_eq!(
            cfg.source_id.as_deref(),
            Some("don:core/dvrv-us-1:devo/1:snap_in/2")
        );
    }
}
