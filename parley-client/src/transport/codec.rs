use shared::models::{LiveFrame, Message, Timestamp};

use crate::error::{SessionError, SessionResult};

/// Parses one inbound text frame. `arrival` stamps frames the server sent
/// without a timestamp.
///
/// # Errors
/// [`SessionError::Decode`] for anything that is not a `{sender, text}` object.
pub fn decode_frame(text: &str, arrival: Timestamp) -> SessionResult<Message> {
    serde_json::from_str::<LiveFrame>(text)
        .map(|frame| frame.into_message(arrival))
        .map_err(|err| SessionError::Decode(err.to_string()))
}

/// Serializes an outbound message.
///
/// # Errors
/// Only if JSON serialization itself fails.
pub fn encode_frame(message: &Message) -> SessionResult<String> {
    serde_json::to_string(&LiveFrame::from(message))
        .map_err(|err| SessionError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reference_server_frame() {
        let arrival = Timestamp::now();
        let message = decode_frame(r#"{"sender":"bob","text":"hi"}"#, arrival).unwrap();

        assert_eq!(message.sender.as_str(), "bob");
        assert_eq!(message.text, "hi");
        assert_eq!(message.timestamp, arrival);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let message = decode_frame(
            r#"{"sender":"bob","text":"hi","channel":"general"}"#,
            Timestamp::now(),
        )
        .unwrap();
        assert_eq!(message.text, "hi");
    }

    #[test]
    fn test_decode_rejects_plain_text() {
        let err = decode_frame("hello there", Timestamp::now()).unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(decode_frame(r#"["bob","hi"]"#, Timestamp::now()).is_err());
        assert!(decode_frame(r#"{"sender":1,"text":"hi"}"#, Timestamp::now()).is_err());
    }

    #[test]
    fn test_encode_then_decode_keeps_timestamp() {
        let original = Message::now("alice", "hello");
        let frame = encode_frame(&original).unwrap();

        assert_eq!(decode_frame(&frame, Timestamp::now()).unwrap(), original);
    }
}
