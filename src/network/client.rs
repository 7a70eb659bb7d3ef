use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::common::{ChatCommand, ChatEvent, ConnectionState};
use crate::error::ChatError;

use super::protocol::{ClientFrame, ServerFrame, decode_frame, encode_frame};
use super::reconnect::ReconnectPolicy;
use super::transport::{WsStream, connect_transport};

type WsSink = SplitSink<WsStream, Message>;

/// Lý do vòng select kết thúc trên một kết nối đang mở.
enum SessionEnd {
    /// Người dùng yêu cầu đóng (hoặc phía gửi lệnh đã biến mất)
    Shutdown,
    /// Socket rơi; vòng ngoài sẽ kết nối lại theo policy
    ConnectionLost,
}

/// Tầng kết nối realtime: một task sở hữu trọn vòng đời socket.
///
/// Nhận `ChatCommand` qua channel, dịch thành khung tin gửi đi; nhận khung
/// tin từ server, dịch thành `ChatEvent` phát lên. Kết nối rơi thì tự
/// kết nối lại theo `ReconnectPolicy` và vào lại phòng chat đang mở.
pub struct RealtimeClient {
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    server_url: String,
    auth_token: String,
    policy: ReconnectPolicy,
    /// Phòng chat hiện tại; join mới thay thế join cũ
    current_chat: Option<i64>,
    /// correlation_id -> unix timestamp lúc gửi, chờ server echo
    pending_sends: HashMap<String, i64>,
}

impl RealtimeClient {
    pub fn new(
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
        server_url: String,
        auth_token: String,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            event_sender,
            command_receiver,
            server_url,
            auth_token,
            policy,
            current_chat: None,
            pending_sends: HashMap::new(),
        }
    }

    pub async fn run(mut self) -> Result<(), Box<dyn Error>> {
        let mut attempt: u32 = 0;
        loop {
            let state = if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting { attempt }
            };
            self.publish_state(state).await;

            match connect_transport(&self.server_url, &self.auth_token).await {
                Ok(stream) => {
                    log::info!("Connected to {}", self.server_url);
                    attempt = 0;
                    self.publish_state(ConnectionState::Connected).await;
                    match self.drive(stream).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::ConnectionLost => {
                            log::warn!("Realtime connection lost");
                        }
                    }
                }
                Err(err) => {
                    log::warn!("Connect attempt failed: {err}");
                    self.publish_error(err.to_string()).await;
                }
            }

            attempt += 1;
            if self.policy.exhausted(attempt) {
                log::error!(
                    "Giving up after {} failed connection attempts",
                    self.policy.max_attempts
                );
                self.publish_state(ConnectionState::GivenUp).await;
                return Ok(());
            }

            let delay = self.policy.delay_for(attempt);
            log::info!(
                "Reconnecting in {delay:?} (attempt {attempt}/{})",
                self.policy.max_attempts
            );
            if self.wait_before_retry(delay).await {
                break;
            }
        }

        self.publish_state(ConnectionState::Disconnected).await;
        Ok(())
    }

    /// Vòng select trên một kết nối đang mở.
    async fn drive(&mut self, stream: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = stream.split();

        // Vào lại phòng chat đang mở sau khi kết nối lại
        if let Some(chat_id) = self.current_chat {
            if let Err(err) = send_frame(&mut sink, &ClientFrame::JoinChat { chat_id }).await {
                log::warn!("Failed to re-join chat {chat_id}: {err}");
                return SessionEnd::ConnectionLost;
            }
        }

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        None => return SessionEnd::Shutdown,
                        Some(ChatCommand::Disconnect) => {
                            let _ = sink.send(Message::Close(None)).await;
                            return SessionEnd::Shutdown;
                        }
                        Some(command) => {
                            if let Some(frame) = self.translate(command) {
                                if let Err(err) = send_frame(&mut sink, &frame).await {
                                    log::warn!("Failed to send frame: {err}");
                                    return SessionEnd::ConnectionLost;
                                }
                            }
                        }
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.route_frame(text.as_str()).await,
                        Some(Ok(Message::Close(_))) => return SessionEnd::ConnectionLost,
                        // Ping/Pong/Binary: xử lý ở tầng transport, bỏ qua
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            log::warn!("Socket error: {err}");
                            self.publish_error(ChatError::Connection(err.to_string()).to_string())
                                .await;
                            return SessionEnd::ConnectionLost;
                        }
                        None => return SessionEnd::ConnectionLost,
                    }
                }
            }
        }
    }

    /// Dịch một lệnh thành khung tin gửi đi; `Disconnect` không có khung tin.
    fn translate(&mut self, command: ChatCommand) -> Option<ClientFrame> {
        match command {
            ChatCommand::JoinChat { chat_id } => {
                self.current_chat = Some(chat_id);
                Some(ClientFrame::JoinChat { chat_id })
            }
            ChatCommand::LeaveChat { chat_id } => {
                if self.current_chat == Some(chat_id) {
                    self.current_chat = None;
                }
                Some(ClientFrame::LeaveChat { chat_id })
            }
            ChatCommand::SendMessage {
                chat_id,
                body,
                kind,
                file_url,
                correlation_id,
            } => {
                self.pending_sends
                    .insert(correlation_id.clone(), Utc::now().timestamp());
                Some(ClientFrame::SendMessage {
                    chat_id,
                    message: body,
                    message_type: kind,
                    file_url,
                    correlation_id,
                })
            }
            ChatCommand::SendTyping { chat_id, is_typing } => {
                Some(ClientFrame::Typing { chat_id, is_typing })
            }
            ChatCommand::MarkAsRead { chat_id } => Some(ClientFrame::MarkAsRead { chat_id }),
            ChatCommand::Disconnect => None,
        }
    }

    /// Định tuyến một khung tin từ server thành sự kiện domain.
    ///
    /// Payload hỏng: log rồi bỏ, không đổi trạng thái, không lan lên UI.
    async fn route_frame(&mut self, raw: &str) {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("{}", ChatError::Decode(err.to_string()));
                return;
            }
        };

        match frame {
            ServerFrame::NewMessage { message } => {
                if let Some(correlation_id) = message.correlation_id.clone() {
                    if self.pending_sends.remove(&correlation_id).is_some() {
                        self.emit(ChatEvent::MessageDelivered {
                            correlation_id,
                            message_id: message.id,
                        })
                        .await;
                    }
                }
                self.emit(ChatEvent::MessageReceived(message)).await;
            }
            ServerFrame::UserTyping(signal) => self.emit(ChatEvent::TypingUpdated(signal)).await,
            ServerFrame::MessagesRead(receipt) => {
                self.emit(ChatEvent::MessagesRead(receipt)).await
            }
            ServerFrame::ChatUpdated(update) => self.emit(ChatEvent::ChatUpdated(update)).await,
            ServerFrame::Error { message } => {
                log::warn!("{}", ChatError::Server(message.clone()));
                self.emit(ChatEvent::ErrorReported(message)).await;
            }
        }
    }

    /// Đợi hết backoff. Lệnh tới trong lúc chờ bị bỏ (fire-and-forget khi
    /// chưa có kết nối); trả về true nếu người dùng yêu cầu đóng hẳn.
    async fn wait_before_retry(&mut self, delay: Duration) -> bool {
        let wait = sleep(delay);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = &mut wait => return false,
                command = self.command_receiver.recv() => {
                    match command {
                        None | Some(ChatCommand::Disconnect) => return true,
                        Some(command) => {
                            log::debug!("Dropping {command:?} while disconnected");
                        }
                    }
                }
            }
        }
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to emit chat event: {err}");
        }
    }

    async fn publish_state(&self, state: ConnectionState) {
        self.emit(ChatEvent::ConnectionChanged(state)).await;
    }

    async fn publish_error(&self, message: String) {
        self.emit(ChatEvent::ErrorReported(message)).await;
    }
}

async fn send_frame(sink: &mut WsSink, frame: &ClientFrame) -> Result<(), tungstenite::Error> {
    match encode_frame(frame) {
        Ok(json) => sink.send(Message::text(json)).await,
        Err(err) => {
            log::warn!("Failed to serialize frame: {err}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MessageKind;

    fn test_client() -> (RealtimeClient, mpsc::Receiver<ChatEvent>, mpsc::Sender<ChatCommand>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (command_tx, command_rx) = mpsc::channel(32);
        let client = RealtimeClient::new(
            event_tx,
            command_rx,
            "ws://127.0.0.1:1/ws".to_string(),
            "token".to_string(),
            ReconnectPolicy::default(),
        );
        (client, event_rx, command_tx)
    }

    fn new_message_json(id: i64, correlation_id: Option<&str>) -> String {
        let correlation = correlation_id
            .map(|c| format!(r#", "correlationId": "{c}""#))
            .unwrap_or_default();
        format!(
            r#"{{"event": "new_message", "data": {{"message": {{
                "id": {id}, "chatId": 7, "senderId": 12, "senderRole": "support",
                "message": "ok", "messageType": "text", "sentAt": 1754550000,
                "readFlag": false{correlation}
            }}}}}}"#
        )
    }

    #[tokio::test]
    async fn new_messages_come_out_in_receipt_order() {
        let (mut client, mut events, _command_tx) = test_client();
        for id in 1..=3 {
            client.route_frame(&new_message_json(id, None)).await;
        }
        for expected in 1..=3 {
            match events.try_recv().unwrap() {
                ChatEvent::MessageReceived(message) => assert_eq!(message.id, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_without_events() {
        let (mut client, mut events, _command_tx) = test_client();
        client.route_frame("{\"event\": \"new_message\"}").await;
        client.route_frame("not even json").await;
        client
            .route_frame(r#"{"event": "user_typing", "data": {"userId": 12}}"#)
            .await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn echoed_correlation_id_confirms_delivery_once() {
        let (mut client, mut events, _command_tx) = test_client();
        let frame = client.translate(ChatCommand::SendMessage {
            chat_id: 7,
            body: "hello".to_string(),
            kind: MessageKind::Text,
            file_url: None,
            correlation_id: "abc-123".to_string(),
        });
        assert!(matches!(frame, Some(ClientFrame::SendMessage { .. })));

        client.route_frame(&new_message_json(55, Some("abc-123"))).await;
        match events.try_recv().unwrap() {
            ChatEvent::MessageDelivered {
                correlation_id,
                message_id,
            } => {
                assert_eq!(correlation_id, "abc-123");
                assert_eq!(message_id, 55);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            events.try_recv().unwrap(),
            ChatEvent::MessageReceived(_)
        ));

        // Echo lặp lại không sinh thêm MessageDelivered
        client.route_frame(&new_message_json(55, Some("abc-123"))).await;
        assert!(matches!(
            events.try_recv().unwrap(),
            ChatEvent::MessageReceived(_)
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn mark_as_read_translates_to_exactly_one_frame() {
        let (mut client, mut events, _command_tx) = test_client();
        let frame = client.translate(ChatCommand::MarkAsRead { chat_id: 9 });
        assert_eq!(frame, Some(ClientFrame::MarkAsRead { chat_id: 9 }));
        // Không có cập nhật cục bộ nào đi kèm
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_supersedes_the_previous_chat() {
        let (mut client, _events, _command_tx) = test_client();
        client.translate(ChatCommand::JoinChat { chat_id: 1 });
        client.translate(ChatCommand::JoinChat { chat_id: 2 });
        assert_eq!(client.current_chat, Some(2));

        client.translate(ChatCommand::LeaveChat { chat_id: 1 });
        assert_eq!(client.current_chat, Some(2));
        client.translate(ChatCommand::LeaveChat { chat_id: 2 });
        assert_eq!(client.current_chat, None);
    }

    #[tokio::test]
    async fn server_error_frame_reaches_the_error_slot() {
        let (mut client, mut events, _command_tx) = test_client();
        client
            .route_frame(r#"{"event": "error", "data": {"message": "chat is closed"}}"#)
            .await;
        match events.try_recv().unwrap() {
            ChatEvent::ErrorReported(message) => assert_eq!(message, "chat is closed"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
