//! Newline-delimited JSON-RPC framing.
//!
//! One message per line. A line is classified by shape: `method` + `id` is a
//! request, `method` alone a notification, `result`/`error` a response.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::{JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, Message};
use serde_json::Value;
use tracing::trace;

/// Upper bound for a single framed message, enforced while reading.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Decode one line into a message.
pub fn decode(line: &str) -> ProtocolResult<Message> {
    let value: Value = serde_json::from_str(line).map_err(|_| ProtocolError::ParseError)?;
    let Value::Object(ref object) = value else {
        return Err(ProtocolError::InvalidRequest(
            "message must be a JSON object".into(),
        ));
    };

    match object.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        _ => {
            return Err(ProtocolError::InvalidRequest(
                "jsonrpc must be \"2.0\"".into(),
            ));
        }
    }

    let has_method = object.contains_key("method");
    let has_id = object.contains_key("id");
    let is_response = object.contains_key("result") || object.contains_key("error");

    let message = if has_method {
        let request: JsonRpcRequest = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidRequest(e.to_string().into()))?;
        if has_id {
            Message::Request(request)
        } else {
            Message::Notification(request)
        }
    } else if is_response {
        let response: JsonRpcResponse = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidRequest(e.to_string().into()))?;
        Message::Response(response)
    } else {
        return Err(ProtocolError::InvalidRequest(
            "message is neither request, response nor notification".into(),
        ));
    };

    trace!("Decoded message: {:?}", message);
    Ok(message)
}

/// Encode a message as a single line, without the trailing newline.
pub fn encode(message: &Message) -> ProtocolResult<String> {
    serde_json::to_string(message).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}
