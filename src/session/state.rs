use crate::common::{
    ChatEvent, ChatMessage, ChatUpdate, ConnectionState, ReadReceipt, TypingSignal,
};

/// Trạng thái phiên chat mà tầng hiển thị đọc.
///
/// Dãy tin nhắn chỉ append theo thứ tự nhận; store không sắp xếp lại và
/// không khử trùng lặp. Các slot còn lại là latest-wins: consumer lấy ra
/// bằng `take_*` để slot không bị xử lý lại ở lần render sau.
pub struct SessionState {
    pub connection: ConnectionState,
    pub current_chat: Option<i64>,
    pub messages: Vec<ChatMessage>,
    typing: Option<TypingSignal>,
    last_read_receipt: Option<ReadReceipt>,
    last_chat_update: Option<ChatUpdate>,
    last_delivery: Option<String>,
    last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            current_chat: None,
            messages: Vec::new(),
            typing: None,
            last_read_receipt: None,
            last_chat_update: None,
            last_delivery: None,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn set_current_chat(&mut self, chat_id: Option<i64>) {
        self.current_chat = chat_id;
    }

    /// Áp một sự kiện từ tầng kết nối vào đúng một slot.
    pub fn apply(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::MessageReceived(message) => self.messages.push(message),
            ChatEvent::MessageDelivered { correlation_id, .. } => {
                self.last_delivery = Some(correlation_id);
            }
            ChatEvent::TypingUpdated(signal) => self.typing = Some(signal),
            ChatEvent::MessagesRead(receipt) => {
                self.apply_read_receipt(&receipt);
                self.last_read_receipt = Some(receipt);
            }
            ChatEvent::ChatUpdated(update) => self.last_chat_update = Some(update),
            ChatEvent::ConnectionChanged(state) => self.connection = state,
            ChatEvent::ErrorReported(message) => self.last_error = Some(message),
        }
    }

    /// Trộn một trang lịch sử (REST hoặc cache) vào dãy tin nhắn.
    pub fn push_history(&mut self, mut history: Vec<ChatMessage>) {
        self.messages.append(&mut history);
        self.messages.sort_by_key(|message| message.sent_at);
    }

    pub fn take_typing(&mut self) -> Option<TypingSignal> {
        self.typing.take()
    }

    pub fn take_read_receipt(&mut self) -> Option<ReadReceipt> {
        self.last_read_receipt.take()
    }

    pub fn take_chat_update(&mut self) -> Option<ChatUpdate> {
        self.last_chat_update.take()
    }

    pub fn take_delivery(&mut self) -> Option<String> {
        self.last_delivery.take()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Người dùng trong receipt đã xem chat: đánh dấu đã đọc các tin
    /// của phía bên kia trong chat đó.
    fn apply_read_receipt(&mut self, receipt: &ReadReceipt) {
        for message in &mut self.messages {
            if message.chat_id == receipt.chat_id && message.sender_id != receipt.user_id {
                message.read = true;
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{MessageKind, SenderRole};

    fn message(id: i64, chat_id: i64, sender_id: i64, sent_at: i64) -> ChatMessage {
        ChatMessage {
            id,
            chat_id,
            sender_id,
            sender_role: SenderRole::User,
            body: format!("msg {id}"),
            kind: MessageKind::Text,
            file_url: None,
            sent_at,
            read: false,
            correlation_id: None,
        }
    }

    fn typing(user_id: i64, user_name: &str, is_typing: bool) -> TypingSignal {
        TypingSignal {
            user_id,
            user_name: user_name.to_string(),
            role: SenderRole::Support,
            is_typing,
        }
    }

    #[test]
    fn message_sequence_is_append_only_in_receipt_order() {
        let mut state = SessionState::new();
        for id in 1..=5 {
            state.apply(ChatEvent::MessageReceived(message(id, 7, 1, 100 + id)));
        }
        assert_eq!(state.messages.len(), 5);
        let ids: Vec<i64> = state.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn latest_typing_signal_wins() {
        let mut state = SessionState::new();
        state.apply(ChatEvent::TypingUpdated(typing(1, "An", true)));
        state.apply(ChatEvent::TypingUpdated(typing(2, "Bình", false)));

        let signal = state.take_typing().expect("typing slot should be set");
        assert_eq!(signal.user_id, 2);
        assert!(!signal.is_typing);
        // Slot đã được consumer lấy đi, không xử lý lại
        assert!(state.take_typing().is_none());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut state = SessionState::new();
        assert!(!state.is_connected());
        state.apply(ChatEvent::ConnectionChanged(ConnectionState::Connected));
        assert!(state.is_connected());
        state.apply(ChatEvent::ConnectionChanged(ConnectionState::Disconnected));
        state.apply(ChatEvent::ConnectionChanged(ConnectionState::Disconnected));
        assert!(!state.is_connected());
        assert!(state.connection.is_terminal());
    }

    #[test]
    fn read_receipt_marks_only_counterparty_messages_of_that_chat() {
        let mut state = SessionState::new();
        state.apply(ChatEvent::MessageReceived(message(1, 7, 1, 101))); // mình gửi
        state.apply(ChatEvent::MessageReceived(message(2, 7, 12, 102))); // phía kia
        state.apply(ChatEvent::MessageReceived(message(3, 8, 12, 103))); // chat khác

        state.apply(ChatEvent::MessagesRead(ReadReceipt {
            user_id: 12,
            chat_id: 7,
        }));

        assert!(state.messages[0].read, "message read by user 12");
        assert!(!state.messages[1].read, "user 12's own message untouched");
        assert!(!state.messages[2].read, "other chat untouched");
        assert_eq!(
            state.take_read_receipt(),
            Some(ReadReceipt {
                user_id: 12,
                chat_id: 7
            })
        );
    }

    #[test]
    fn history_merges_sorted_by_sent_at() {
        let mut state = SessionState::new();
        state.apply(ChatEvent::MessageReceived(message(10, 7, 1, 500)));
        state.push_history(vec![message(8, 7, 12, 300), message(9, 7, 1, 400)]);

        let sent: Vec<i64> = state.messages.iter().map(|m| m.sent_at).collect();
        assert_eq!(sent, vec![300, 400, 500]);
    }

    #[test]
    fn error_slot_is_overwritten_and_cleared_on_take() {
        let mut state = SessionState::new();
        state.apply(ChatEvent::ErrorReported("first".to_string()));
        state.apply(ChatEvent::ErrorReported("second".to_string()));
        assert_eq!(state.take_error().as_deref(), Some("second"));
        assert!(state.take_error().is_none());
    }

    #[test]
    fn delivery_slot_reports_the_correlation_id() {
        let mut state = SessionState::new();
        state.apply(ChatEvent::MessageDelivered {
            correlation_id: "abc".to_string(),
            message_id: 5,
        });
        assert_eq!(state.take_delivery().as_deref(), Some("abc"));
    }
}
