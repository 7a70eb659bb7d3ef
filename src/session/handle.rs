use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::common::{ChatCommand, ChatEvent, MessageKind};
use crate::config::AppConfig;
use crate::network::{RealtimeClient, ReconnectPolicy};

const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Phiên chat hỗ trợ: đối tượng tường minh do composition root sở hữu.
///
/// `open` là lối vào duy nhất để có kết nối; muốn thay kết nối thì
/// `close` rồi `open` lại — không có accessor tĩnh, không thay socket ngầm.
/// Mọi thao tác gửi đều fire-and-forget: khi chưa có kết nối chúng bị bỏ
/// kèm một dòng log, người gọi không phân biệt được với gửi-chưa-tới.
pub struct ChatSession {
    command_sender: mpsc::Sender<ChatCommand>,
    worker: JoinHandle<()>,
}

impl ChatSession {
    /// Mở phiên: nối channel, spawn task mạng, trả về handle cùng
    /// receiver sự kiện cho tầng hiển thị.
    pub fn open(config: &AppConfig, auth_token: String) -> (Self, mpsc::Receiver<ChatEvent>) {
        Self::open_with_policy(config, auth_token, ReconnectPolicy::default())
    }

    pub fn open_with_policy(
        config: &AppConfig,
        auth_token: String,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER);
        let (event_sender, event_receiver) = mpsc::channel(EVENT_BUFFER);

        let client = RealtimeClient::new(
            event_sender,
            command_receiver,
            config.server_url.clone(),
            auth_token,
            policy,
        );
        let worker = tokio::spawn(async move {
            if let Err(err) = client.run().await {
                log::error!("Realtime client terminated: {err}");
            }
        });

        (
            Self {
                command_sender,
                worker,
            },
            event_receiver,
        )
    }

    pub fn join_chat(&self, chat_id: i64) {
        self.send(ChatCommand::JoinChat { chat_id });
    }

    pub fn leave_chat(&self, chat_id: i64) {
        self.send(ChatCommand::LeaveChat { chat_id });
    }

    /// Gửi tin nhắn; trả về correlation id để đối chiếu với
    /// `ChatEvent::MessageDelivered` khi server echo lại.
    pub fn send_message(
        &self,
        chat_id: i64,
        body: String,
        kind: MessageKind,
        file_url: Option<String>,
    ) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.send(ChatCommand::SendMessage {
            chat_id,
            body,
            kind,
            file_url,
            correlation_id: correlation_id.clone(),
        });
        correlation_id
    }

    pub fn send_typing(&self, chat_id: i64, is_typing: bool) {
        self.send(ChatCommand::SendTyping { chat_id, is_typing });
    }

    pub fn mark_as_read(&self, chat_id: i64) {
        self.send(ChatCommand::MarkAsRead { chat_id });
    }

    /// Đóng phiên có trật tự: yêu cầu ngắt kết nối rồi đợi task mạng dừng.
    pub async fn close(self) {
        // Task có thể đã tự dừng (GivenUp); gửi lỗi thì bỏ qua
        let _ = self.command_sender.send(ChatCommand::Disconnect).await;
        if let Err(err) = self.worker.await {
            log::warn!("Realtime worker did not shut down cleanly: {err}");
        }
    }

    fn send(&self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to realtime client: {err}");
        }
    }
}
