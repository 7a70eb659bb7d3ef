use crate::common::types::MessageKind;

/// Lệnh gửi xuống tầng kết nối realtime.
///
/// Tất cả đều là fire-and-forget: người gọi không nhận phản hồi trực tiếp,
/// kết quả (nếu có) quay lại dưới dạng `ChatEvent`.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    /// Vào một phòng chat; join mới thay thế join cũ (mỗi kết nối một phòng)
    JoinChat { chat_id: i64 },
    LeaveChat { chat_id: i64 },
    /// Gửi tin nhắn; xác nhận lưu trữ về sau qua `MessageDelivered`
    /// nhờ correlation_id được server echo lại.
    SendMessage {
        chat_id: i64,
        body: String,
        kind: MessageKind,
        file_url: Option<String>,
        correlation_id: String,
    },
    SendTyping { chat_id: i64, is_typing: bool },
    MarkAsRead { chat_id: i64 },
    /// Đóng kết nối có chủ đích; idempotent.
    Disconnect,
}
