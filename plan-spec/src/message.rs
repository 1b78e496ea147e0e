//! Client-facing chat message types (request body of `POST /api/chat`).

use serde::{Deserialize, Serialize};

/// Maximum number of messages accepted in one request.
pub const MAX_MESSAGES: usize = 200;
/// Maximum length (in characters) of a single message's content.
pub const MAX_CONTENT_CHARS: usize = 32_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
}

/// An attachment carried on a `ClientMessage` (images only, per spec).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One message in a chat turn, as received from or echoed to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub status: String,
    pub timestamp: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageValidationError {
    #[error("too many messages: {0} exceeds the limit of {MAX_MESSAGES}")]
    TooManyMessages(usize),
    #[error("message {0} has no content")]
    EmptyContent(usize),
    #[error("message {index} content exceeds {MAX_CONTENT_CHARS} characters ({len})")]
    ContentTooLong { index: usize, len: usize },
}

/// Validates a request body's messages against spec §6's constraints.
///
/// At least one message is required; every message's content must be
/// non-empty and at most [`MAX_CONTENT_CHARS`] characters; the list must
/// contain at most [`MAX_MESSAGES`] entries.
pub fn validate_messages(messages: &[ClientMessage]) -> Result<(), MessageValidationError> {
    if messages.len() > MAX_MESSAGES {
        return Err(MessageValidationError::TooManyMessages(messages.len()));
    }
    for (index, message) in messages.iter().enumerate() {
        if message.content.is_empty() {
            return Err(MessageValidationError::EmptyContent(index));
        }
        let len = message.content.chars().count();
        if len > MAX_CONTENT_CHARS {
            return Err(MessageValidationError::ContentTooLong { index, len });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> ClientMessage {
        ClientMessage {
            id: "1".into(),
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
            status: "complete".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn empty_content_rejected() {
        let err = validate_messages(&[msg("")]).unwrap_err();
        assert_eq!(err, MessageValidationError::EmptyContent(0));
    }

    #[test]
    fn too_many_messages_rejected() {
        let messages: Vec<_> = (0..MAX_MESSAGES + 1).map(|_| msg("hi")).collect();
        let err = validate_messages(&messages).unwrap_err();
        assert_eq!(err, MessageValidationError::TooManyMessages(MAX_MESSAGES + 1));
    }

    #[test]
    fn content_too_long_rejected() {
        let long = "a".repeat(MAX_CONTENT_CHARS + 1);
        let err = validate_messages(&[msg(&long)]).unwrap_err();
        assert_eq!(
            err,
            MessageValidationError::ContentTooLong {
                index: 0,
                len: MAX_CONTENT_CHARS + 1
            }
        );
    }

    #[test]
    fn valid_messages_accepted() {
        assert!(validate_messages(&[msg("hello"), msg("world")]).is_ok());
    }

    #[test]
    fn attachment_roundtrip_uses_camel_case() {
        let a = Attachment {
            id: "a1".into(),
            kind: AttachmentKind::Image,
            mime_type: "image/png".into(),
            data: "AAAA".into(),
            name: Some("shot.png".into()),
        };
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["mimeType"], "image/png");
        let back: Attachment = serde_json::from_value(value).unwrap();
        assert_eq!(back, a);
    }
}
