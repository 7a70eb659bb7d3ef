use crate::common::types::{ChatMessage, ChatUpdate, ConnectionState, ReadReceipt, TypingSignal};

/// Sự kiện từ tầng kết nối gửi lên phần còn lại của ứng dụng.
///
/// Được phát theo thứ tự nhận qua một mpsc channel — consumer đọc như
/// một stream, không có slot nào bị ghi đè trước khi tới nơi.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessageReceived(ChatMessage),
    /// Server đã lưu tin nhắn mà client gửi với correlation id này.
    MessageDelivered {
        correlation_id: String,
        message_id: i64,
    },
    TypingUpdated(TypingSignal),
    MessagesRead(ReadReceipt),
    ChatUpdated(ChatUpdate),
    ConnectionChanged(ConnectionState),
    /// Lỗi ở dạng chuỗi cho người đọc: lỗi kết nối hoặc lỗi server báo về.
    ErrorReported(String),
}
