use crate::models::chat::{ serialize_timestamp, ChatMessage, Role };
use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "rate")] Rate {
        thumbs_up: bool,
    },
    #[serde(rename = "toggle_copy")]
    ToggleCopy,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "message")] Message {
        index: usize,
        id: String,
        role: Role,
        content: String,
        #[serde(serialize_with = "serialize_timestamp")]
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "streaming")] Streaming {
        active: bool,
    },
    #[serde(rename = "rated")] Rated {
        thumbs_up: bool,
        sample: Option<String>,
    },
    #[serde(rename = "copy_view")] CopyView {
        visible: bool,
        transcript: String,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn from_chat(index: usize, message: &ChatMessage) -> Self {
        ServerMessage::Message {
            index,
            id: message.id(),
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parsing() {
        let chat: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"Hi"}"#).unwrap();
        assert_eq!(chat, ClientMessage::Chat { content: "Hi".to_string() });

        let rate: ClientMessage = serde_json::from_str(r#"{"type":"rate","thumbs_up":false}"#).unwrap();
        assert_eq!(rate, ClientMessage::Rate { thumbs_up: false });

        let copy: ClientMessage = serde_json::from_str(r#"{"type":"toggle_copy"}"#).unwrap();
        assert_eq!(copy, ClientMessage::ToggleCopy);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"cancel"}"#).is_err());
    }

    #[test]
    fn test_server_message_tagging() {
        let msg = ChatMessage::user("Hi");
        let value = serde_json::to_value(ServerMessage::from_chat(0, &msg)).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["index"], 0);
        assert_eq!(value["role"], "user");
        assert_eq!(value["id"], msg.id());
        assert_eq!(value["timestamp"], msg.iso_timestamp());

        let value = serde_json::to_value(ServerMessage::Streaming { active: true }).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "streaming", "active": true }));
    }
}
