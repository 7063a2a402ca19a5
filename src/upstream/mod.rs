//! Queue client for polling the local development server
//!
//! One GET against `<base_url><path>` per cycle. The server answers with a
//! single JSON object; presence of an `id` field marks it as an unsent
//! message, in which case `phone` and `message_body` are required.

use anyhow::{anyhow, Result};
use log::debug;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::UpstreamConfig;

/// Raw shape of the queue server's response. Everything is optional on
/// the wire; [`parse_response`] enforces the conditional requirements.
#[derive(Debug, Deserialize)]
struct QueueResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    message_body: Option<String>,
}

/// One unsent message as reported by the queue server. Ephemeral: built
/// from a response, handed to the transport, dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Queue identifier, rendered as a string for logging. Its presence in
    /// the response is what marked the record as unsent.
    pub id: String,
    pub phone: String,
    pub body: String,
}

/// Interpret one response body. `Ok(None)` means "no unsent message"
/// (no `id` field); a present `id` with `phone` or `message_body`
/// missing is an error.
pub fn parse_response(body: &str) -> Result<Option<PendingMessage>> {
    let response: QueueResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("Malformed queue response: {}", e))?;

    let id = match response.id {
        Some(id) => match id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        },
        None => return Ok(None),
    };

    let phone = response
        .phone
        .ok_or_else(|| anyhow!("Queue record {} is missing 'phone'", id))?;
    let body = response
        .message_body
        .ok_or_else(|| anyhow!("Queue record {} is missing 'message_body'", id))?;

    Ok(Some(PendingMessage { id, phone, body }))
}

/// HTTP client for the queue server.
#[derive(Clone)]
pub struct QueueClient {
    config: UpstreamConfig,
    client: reqwest::Client,
}

impl QueueClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn poll_url(&self) -> String {
        self.config.poll_url()
    }

    /// Fetch the next pending message, if the server has one.
    ///
    /// Transport errors, non-2xx statuses, and malformed bodies are all
    /// `Err`: the cycle logs them and moves on. With `timeout_seconds = 0`
    /// the request can block indefinitely; that is the configured-off
    /// default, kept as-is from the original deployment.
    pub async fn fetch_pending(&self) -> Result<Option<PendingMessage>> {
        let url = self.poll_url();
        debug!("Polling queue at {}", url);

        let request = self.client.get(&url).send();
        let response = if self.config.timeout_seconds > 0 {
            let deadline = Duration::from_secs(self.config.timeout_seconds);
            timeout(deadline, request)
                .await
                .map_err(|_| anyhow!("Queue poll timed out after {}s", self.config.timeout_seconds))?
        } else {
            request.await
        }
        .map_err(|e| anyhow!("Queue poll failed: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow!("Queue server returned status {}", response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read queue response: {}", e))?;

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_without_id_is_empty_queue() {
        assert_eq!(parse_response("{}").unwrap(), None);
        assert_eq!(
            parse_response(r#"{"status": "empty"}"#).unwrap(),
            None
        );
        // Stray phone/message_body without an id still means no message
        assert_eq!(
            parse_response(r#"{"phone": "+15550001111", "message_body": "hi"}"#).unwrap(),
            None
        );
    }

    #[test]
    fn full_record_parses() {
        let parsed = parse_response(
            r#"{"id": 42, "phone": "+15550001111", "message_body": "pick up milk"}"#,
        )
        .unwrap()
        .expect("pending message");
        assert_eq!(parsed.id, "42");
        assert_eq!(parsed.phone, "+15550001111");
        assert_eq!(parsed.body, "pick up milk");
    }

    #[test]
    fn string_ids_kept_verbatim() {
        let parsed = parse_response(
            r#"{"id": "msg-007", "phone": "5551234", "message_body": "x"}"#,
        )
        .unwrap()
        .expect("pending message");
        assert_eq!(parsed.id, "msg-007");
    }

    #[test]
    fn present_id_requires_phone_and_body() {
        assert!(parse_response(r#"{"id": 1, "message_body": "x"}"#).is_err());
        assert!(parse_response(r#"{"id": 1, "phone": "5551234"}"#).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_response("not json").is_err());
        assert!(parse_response(r#"{"id": }"#).is_err());
        assert!(parse_response("").is_err());
    }
}
