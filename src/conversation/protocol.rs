//! WebSocket protocol message definitions
//! These are the wire types for conversation sessions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ConversationStatus;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Something the user said or typed
    UserMessage {
        text: String,
        /// Ask for a spoken reply
        #[serde(default)]
        voice: bool,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        #[serde(default)]
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once after the upgrade
    Welcome {
        conversation_id: Uuid,
        avatar_id: Uuid,
        server_time: u64,
    },

    /// Session status changed
    Status { status: ConversationStatus },

    /// Avatar reply for the last user message
    Reply {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_base64: Option<String>,
        memories_used: usize,
    },

    /// A message could not be processed
    Error { message: String },

    /// Pong response
    Pong {
        /// Echo client timestamp
        t: u64,
        /// Server timestamp
        server_time: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_voice_defaults_to_false() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"user_message","text":"hello"}"#).unwrap();
        match msg {
            ClientMsg::UserMessage { text, voice } => {
                assert_eq!(text, "hello");
                assert!(!voice);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn ping_without_timestamp_parses() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Ping { t: 0 }));
    }

    #[test]
    fn server_frames_are_tagged() {
        let json = serde_json::to_value(ServerMsg::Status {
            status: ConversationStatus::Processing,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "status", "status": "processing"}));

        let reply = serde_json::to_value(ServerMsg::Reply {
            text: "hi".to_string(),
            audio_base64: None,
            memories_used: 2,
        })
        .unwrap();
        assert_eq!(
            reply,
            serde_json::json!({"type": "reply", "text": "hi", "memories_used": 2})
        );
    }
}
