use serde::{Deserialize, Serialize};

use crate::common::{ChatMessage, ChatUpdate, MessageKind, ReadReceipt, TypingSignal};

/// Khung tin client -> server.
///
/// Envelope JSON: `{"event": "<tên sự kiện>", "data": {...}}` với tên
/// sự kiện snake_case và field camelCase, theo đúng giao thức backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    JoinChat {
        chat_id: i64,
    },
    LeaveChat {
        chat_id: i64,
    },
    SendMessage {
        chat_id: i64,
        message: String,
        message_type: MessageKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_url: Option<String>,
        correlation_id: String,
    },
    Typing {
        chat_id: i64,
        is_typing: bool,
    },
    MarkAsRead {
        chat_id: i64,
    },
}

/// Khung tin server -> client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerFrame {
    NewMessage { message: ChatMessage },
    UserTyping(TypingSignal),
    MessagesRead(ReadReceipt),
    ChatUpdated(ChatUpdate),
    Error { message: String },
}

pub fn encode_frame(frame: &ClientFrame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

pub fn decode_frame(raw: &str) -> serde_json::Result<ServerFrame> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SenderRole;

    #[test]
    fn join_chat_uses_wire_event_name() {
        let json = encode_frame(&ClientFrame::JoinChat { chat_id: 42 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "join_chat");
        assert_eq!(value["data"]["chatId"], 42);
    }

    #[test]
    fn send_message_carries_correlation_id_and_omits_empty_file_url() {
        let frame = ClientFrame::SendMessage {
            chat_id: 7,
            message: "xe bị trầy, liên hệ thế nào?".to_string(),
            message_type: MessageKind::Text,
            file_url: None,
            correlation_id: "c0ffee".to_string(),
        };
        let json = encode_frame(&frame).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "send_message");
        assert_eq!(value["data"]["messageType"], "text");
        assert_eq!(value["data"]["correlationId"], "c0ffee");
        assert!(value["data"].get("fileUrl").is_none());
    }

    #[test]
    fn mark_as_read_has_only_the_chat_id() {
        let json = encode_frame(&ClientFrame::MarkAsRead { chat_id: 3 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "mark_as_read");
        assert_eq!(
            value["data"],
            serde_json::json!({ "chatId": 3 })
        );
    }

    #[test]
    fn decodes_new_message() {
        let raw = r#"{
            "event": "new_message",
            "data": {
                "message": {
                    "id": 901,
                    "chatId": 7,
                    "senderId": 12,
                    "senderRole": "support",
                    "message": "Chào anh, em kiểm tra ngay ạ",
                    "messageType": "text",
                    "sentAt": 1754550000,
                    "readFlag": false
                }
            }
        }"#;
        match decode_frame(raw).unwrap() {
            ServerFrame::NewMessage { message } => {
                assert_eq!(message.id, 901);
                assert_eq!(message.sender_role, SenderRole::Support);
                assert_eq!(message.kind, MessageKind::Text);
                assert_eq!(message.correlation_id, None);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn decodes_user_typing() {
        let raw = r#"{
            "event": "user_typing",
            "data": {"userId": 12, "userName": "Linh", "userRole": "support", "isTyping": true}
        }"#;
        match decode_frame(raw).unwrap() {
            ServerFrame::UserTyping(signal) => {
                assert_eq!(signal.user_id, 12);
                assert!(signal.is_typing);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn rejects_payload_with_missing_fields() {
        let raw = r#"{"event": "messages_read", "data": {"userId": 12}}"#;
        assert!(decode_frame(raw).is_err());

        let raw = r#"{"event": "definitely_not_an_event", "data": {}}"#;
        assert!(decode_frame(raw).is_err());
    }
}
