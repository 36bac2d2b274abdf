use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;

/// Wire protocol: one JSON object per WebSocket text frame, tagged by a
/// `type` field.
///
///   {"type":"join","username":"alice","chatname":"lobby","password":"pw"}
///   {"type":"message","content":"hi"}
///
/// `ClientEvent` mirrors what arrives on the wire for the two kinds we
/// handle. Fields are optional here so that a missing field is a
/// validation error rather than a parse error; [`parse_inbound`] turns it
/// into a checked [`Inbound`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientEvent {
    Join {
        username: Option<String>,
        chatname: Option<String>,
        password: Option<String>,
    },
    Message {
        content: Option<String>,
    },
}

/// A validated inbound event. Every field here has passed the per-kind
/// checks, so handlers never look at raw payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Join(JoinRequest),
    Message { content: String },
    /// Valid JSON whose `type` is absent or one we don't handle.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub username: String,
    pub chatname: String,
    pub password: String,
}

/// Parse and validate one inbound frame.
///
/// Text that isn't JSON, or is `null`, is malformed. Any other JSON value
/// without a `join` or `message` type is [`Inbound::Unknown`]. Content is
/// checked for emptiness after trimming but forwarded as sent.
pub fn parse_inbound(text: &str) -> Result<Inbound, ChatError> {
    let value: Value = serde_json::from_str(text).map_err(ChatError::Malformed)?;

    let handled = matches!(
        value.get("type").and_then(Value::as_str),
        Some("join" | "message")
    );
    if !handled && !value.is_null() {
        return Ok(Inbound::Unknown);
    }

    let event = ClientEvent::deserialize(value).map_err(ChatError::Malformed)?;

    match event {
        ClientEvent::Join {
            username,
            chatname,
            password,
        } => {
            let (Some(username), Some(chatname), Some(password)) = (
                non_empty(username),
                non_empty(chatname),
                non_empty(password),
            ) else {
                return Err(ChatError::MissingJoinFields);
            };
            Ok(Inbound::Join(JoinRequest {
                username,
                chatname,
                password,
            }))
        }
        ClientEvent::Message { content } => match content {
            Some(content) if !content.trim().is_empty() => Ok(Inbound::Message { content }),
            _ => Err(ChatError::EmptyContent),
        },
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

/// An encoded outbound event, shared by every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Join ack to the joiner, and join notice to everyone else.
    Join { username: String },
    Leave { username: String },
    Message { username: String, content: String },
    Error { message: String },
}

impl ServerEvent {
    pub fn error(err: &ChatError) -> Self {
        ServerEvent::Error {
            message: err.to_string(),
        }
    }

    /// Serialize once; the result is cheap to clone per recipient.
    pub fn encode(&self) -> Result<Frame, ChatError> {
        let json = serde_json::to_string(self).map_err(ChatError::Encode)?;
        Ok(Arc::from(json))
    }
}
