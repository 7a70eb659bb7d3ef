use serde::{Deserialize, Serialize};

/// Vai trò của người gửi trong phiên chat hỗ trợ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Support,
    System,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::User => "user",
            SenderRole::Support => "support",
            SenderRole::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(SenderRole::User),
            "support" => Some(SenderRole::Support),
            "system" => Some(SenderRole::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            "file" => Some(MessageKind::File),
            _ => None,
        }
    }
}

/// Domain model đại diện một tin nhắn chat.
///
/// Do backend tạo ra; client chỉ append vào dãy, không bao giờ sửa
/// (trừ cờ `read` khi có read receipt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub sender_role: SenderRole,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "messageType", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Unix timestamp (giây) do server gán
    pub sent_at: i64,
    #[serde(rename = "readFlag", default)]
    pub read: bool,
    /// Id tương quan do client sinh ra, server echo lại khi lưu xong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Tín hiệu "đang gõ" — chỉ tồn tại tạm thời, không lưu trữ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub user_id: i64,
    pub user_name: String,
    #[serde(rename = "userRole")]
    pub role: SenderRole,
    pub is_typing: bool,
}

/// Báo đã đọc: user đã xem tin nhắn trong chat tính đến thời điểm nhận.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: i64,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
    pub chat_id: i64,
    pub timestamp: i64,
}

/// Trạng thái kết nối; chỉ tầng mạng được phép chuyển trạng thái.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    GivenUp,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Trạng thái kết thúc: sẽ không có lần kết nối lại nào nữa.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::GivenUp)
    }
}
