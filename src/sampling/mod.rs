//! Agent-to-host sampling round trips.
//!
//! A tool handler that needs generated content sends `sampling/createMessage`
//! back over its own session and suspends until the host answers. Only that
//! handler's task waits; the read loop keeps serving other requests.

use crate::error::{ProtocolError, SamplingError, SamplingResult};
use crate::protocol::peer::Peer;
use crate::protocol::session::Session;
use crate::protocol::types::{CreateMessageParams, CreateMessageResult, methods};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Handle a tool uses to ask the host for a completion.
#[derive(Clone)]
pub struct SamplingBridge {
    peer: Peer,
    session: Arc<Session>,
}

impl SamplingBridge {
    pub fn new(peer: Peer, session: Arc<Session>) -> Self {
        Self { peer, session }
    }

    /// Whether the host declared it can serve sampling requests.
    pub fn is_available(&self) -> bool {
        self.session.client_supports_sampling()
    }

    /// One sampling round. No retry on failure.
    #[instrument(skip(self, params), fields(max_tokens = params.max_tokens))]
    pub async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> SamplingResult<CreateMessageResult> {
        if !self.is_available() {
            return Err(SamplingError::Unsupported);
        }

        debug!("Requesting completion ({} message(s))", params.messages.len());
        let result = self
            .peer
            .call::<_, CreateMessageResult>(methods::CREATE_MESSAGE, &params)
            .await
            .map_err(|e| match e {
                ProtocolError::Remote { message, .. } => SamplingError::Rejected(message),
                other => SamplingError::Transport(other),
            })?;

        debug!("Completion received from model '{}'", result.model);
        Ok(result)
    }

    /// Ask for a completion and require a text block back.
    pub async fn complete_text(&self, prompt: &str, max_tokens: u32) -> SamplingResult<String> {
        let result = self
            .create_message(CreateMessageParams::user_prompt(prompt, max_tokens))
            .await?;

        match result.content.as_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!("Sampling returned non-text content: {}", result.content.kind());
                Err(SamplingError::NotText(result.content.kind()))
            }
        }
    }

    /// Ask for a completion and parse it as a JSON payload.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> SamplingResult<T> {
        let text = self.complete_text(prompt, max_tokens).await?;
        parse_json_payload(&text)
    }
}

/// Opening fence with an optional info string, body, closing fence.
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[\w+.-]*[ \t]*\r?\n?(.*?)\s*```$").expect("Invalid regex: code fence pattern")
});

/// Strip an optional Markdown code fence, whatever its language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let body = text.trim();
    CODE_FENCE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map_or(body, |inner| inner.as_str())
        .trim()
}

/// Parse generated text, tolerating code fences.
pub fn parse_json_payload<T: DeserializeOwned>(text: &str) -> SamplingResult<T> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| {
        warn!("Sampled text did not parse: {}", e);
        SamplingError::Unparsable(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::transport::StreamTransport;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences(" ```json\n[1]\n``` \n"), "[1]");
        assert_eq!(strip_code_fences("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```javascript\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_payload() {
        let person: Person = parse_json_payload("```json\n{\"name\":\"B\"}\n```").unwrap();
        assert_eq!(person.name, "B");

        let err = parse_json_payload::<Person>("Sure! Here is a user: Bob").unwrap_err();
        assert!(matches!(err, SamplingError::Unparsable(_)));

        let err = parse_json_payload::<Person>("{\"nickname\":\"B\"}").unwrap_err();
        assert!(matches!(err, SamplingError::Unparsable(_)));
    }

    #[tokio::test]
    async fn test_unsupported_without_host_capability() {
        let transport = StreamTransport::new(tokio::io::empty(), tokio::io::sink());
        let bridge = SamplingBridge::new(Peer::new(Arc::new(transport)), Arc::new(Session::new()));

        assert!(!bridge.is_available());
        let err = bridge.complete_text("hi", 10).await.unwrap_err();
        assert!(matches!(err, SamplingError::Unsupported));
    }
}
