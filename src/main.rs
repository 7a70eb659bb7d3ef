mod common;
mod config;
mod error;
mod network;
mod rest;
mod session;
mod storage;

use std::error::Error;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

use common::{ChatEvent, ChatMessage, ConnectionState, MessageKind};
use config::AppConfig;
use network::ReconnectPolicy;
use rest::HistoryClient;
use session::{ChatSession, SessionState};
use storage::SessionDatabase;

const TOKEN_ENV: &str = "SUPPORT_CHAT_TOKEN";
const HISTORY_PAGE: usize = 50;

#[derive(Parser)]
#[command(
    name = "rental_support_chat",
    version,
    about = "Support chat client for the vehicle rental app"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Override the realtime server URL (persisted for later runs)
    #[arg(long, value_name = "URL")]
    server: Option<String>,
    /// Chat id to join right after connecting
    #[arg(long, value_name = "ID")]
    chat: Option<i64>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Connect, report the connection outcome, then exit
    Probe,
    /// Forget the stored auth token
    Logout,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    if let Some(server) = &cli.server {
        app_config.server_url = server.clone();
        config::persist_server_url(&cli.config, server);
    }

    storage::ensure_data_dir()?;
    let db = SessionDatabase::new()?;

    if cli.mode == Some(Mode::Logout) {
        db.clear_auth_token()?;
        println!("Stored auth token removed");
        return Ok(());
    }

    let token = resolve_auth_token(&db)?;

    if cli.mode == Some(Mode::Probe) {
        return run_probe(&app_config, token).await;
    }

    run_console_client(app_config, token, db, cli.chat).await
}

/// Token lấy từ biến môi trường (và được nhớ lại), không có thì dùng
/// token đã lưu từ lần đăng nhập trước.
fn resolve_auth_token(db: &SessionDatabase) -> Result<String, Box<dyn Error>> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        let token = token.trim().to_string();
        if !token.is_empty() {
            if let Err(err) = db.save_auth_token(&token) {
                log::warn!("Failed to persist auth token: {err}");
            }
            return Ok(token);
        }
    }

    match db.load_auth_token()? {
        Some(token) => Ok(token),
        None => Err(format!("No auth token: set {TOKEN_ENV} or log in once").into()),
    }
}

/// Chế độ chẩn đoán: kết nối, in kết quả, thoát.
async fn run_probe(config: &AppConfig, token: String) -> Result<(), Box<dyn Error>> {
    let policy = ReconnectPolicy {
        max_attempts: 2,
        ..ReconnectPolicy::default()
    };
    let (session, mut events) = ChatSession::open_with_policy(config, token, policy);

    let mut outcome = "no connection events received".to_string();
    while let Some(event) = events.recv().await {
        match event {
            ChatEvent::ConnectionChanged(ConnectionState::Connected) => {
                outcome = format!("connected to {}", config.server_url);
                break;
            }
            ChatEvent::ConnectionChanged(state) if state.is_terminal() => {
                outcome = "gave up: server unreachable".to_string();
                break;
            }
            ChatEvent::ErrorReported(message) => log::warn!("{message}"),
            _ => {}
        }
    }
    println!("{outcome}");

    session.close().await;
    Ok(())
}

async fn run_console_client(
    config: AppConfig,
    token: String,
    db: SessionDatabase,
    initial_chat: Option<i64>,
) -> Result<(), Box<dyn Error>> {
    let history = HistoryClient::new(config.api_base_url.clone(), token.clone());
    let (session, mut events) = ChatSession::open(&config, token);
    let mut state = SessionState::new();

    if let Some(chat_id) = initial_chat {
        open_chat(chat_id, &session, &history, &db, &mut state).await;
    }

    println!(
        "Commands: /join <id>, /leave, /read, /typing on|off, /quit; anything else is sent as a message"
    );

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    None => break,
                    Some(event) => {
                        absorb_event(event, &db, &mut state);
                        render_slots(&mut state);
                    }
                }
            }
            line = stdin.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_input(line.trim(), &session, &history, &db, &mut state).await {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }

    session.close().await;
    Ok(())
}

/// Vào một phòng chat: nạp lịch sử (REST, rơi thì lấy cache), join, ghi nhớ.
async fn open_chat(
    chat_id: i64,
    session: &ChatSession,
    history: &HistoryClient,
    db: &SessionDatabase,
    state: &mut SessionState,
) {
    match history.fetch_page(chat_id, None, Some(HISTORY_PAGE)).await {
        Ok(messages) => {
            for message in &messages {
                if let Err(err) = db.cache_message(message) {
                    log::warn!("Failed to cache message {}: {err}", message.id);
                }
            }
            state.push_history(messages);
        }
        Err(err) => {
            log::warn!("History fetch failed, falling back to cached messages: {err}");
            match db.recent_messages(chat_id, HISTORY_PAGE) {
                Ok(cached) => state.push_history(cached),
                Err(err) => log::warn!("Failed to read cached messages: {err}"),
            }
        }
    }

    for message in &state.messages {
        if message.chat_id == chat_id {
            print_message(message);
        }
    }

    session.join_chat(chat_id);
    state.set_current_chat(Some(chat_id));
}

fn absorb_event(event: ChatEvent, db: &SessionDatabase, state: &mut SessionState) {
    match &event {
        ChatEvent::MessageReceived(message) => {
            if let Err(err) = db.cache_message(message) {
                log::warn!("Failed to cache message {}: {err}", message.id);
            }
            print_message(message);
        }
        ChatEvent::MessagesRead(receipt) => {
            if let Err(err) = db.apply_read_receipt(receipt.chat_id, receipt.user_id) {
                log::warn!("Failed to persist read receipt: {err}");
            }
        }
        ChatEvent::ConnectionChanged(connection) => print_connection(connection),
        _ => {}
    }
    state.apply(event);
}

/// Đọc xong thì clear slot để lần render sau không xử lý lại.
fn render_slots(state: &mut SessionState) {
    if let Some(signal) = state.take_typing() {
        if signal.is_typing {
            println!("... {} is typing", signal.user_name);
        }
    }
    if let Some(receipt) = state.take_read_receipt() {
        println!("(seen by user {})", receipt.user_id);
    }
    if let Some(update) = state.take_chat_update() {
        log::debug!("Chat {} updated at {}", update.chat_id, update.timestamp);
    }
    if let Some(correlation_id) = state.take_delivery() {
        log::debug!("Send {correlation_id} confirmed by server");
    }
    if let Some(error) = state.take_error() {
        println!("! {error}");
    }
}

async fn handle_input(
    line: &str,
    session: &ChatSession,
    history: &HistoryClient,
    db: &SessionDatabase,
    state: &mut SessionState,
) -> bool {
    if line.is_empty() {
        return true;
    }
    if line == "/quit" {
        return false;
    }

    if let Some(rest) = line.strip_prefix("/join ") {
        match rest.trim().parse::<i64>() {
            Ok(chat_id) => open_chat(chat_id, session, history, db, state).await,
            Err(_) => println!("Usage: /join <chat id>"),
        }
        return true;
    }
    if line == "/leave" {
        match state.current_chat {
            Some(chat_id) => {
                session.leave_chat(chat_id);
                state.set_current_chat(None);
            }
            None => println!("Not in a chat"),
        }
        return true;
    }
    if line == "/read" {
        match state.current_chat {
            Some(chat_id) => session.mark_as_read(chat_id),
            None => println!("Not in a chat"),
        }
        return true;
    }
    if let Some(rest) = line.strip_prefix("/typing") {
        match (state.current_chat, rest.trim()) {
            (Some(chat_id), "on") => session.send_typing(chat_id, true),
            (Some(chat_id), "off" | "") => session.send_typing(chat_id, false),
            (Some(_), _) => println!("Usage: /typing on|off"),
            (None, _) => println!("Not in a chat"),
        }
        return true;
    }

    let Some(chat_id) = state.current_chat else {
        println!("Join a chat first: /join <id>");
        return true;
    };

    if state.is_connected() {
        let correlation_id =
            session.send_message(chat_id, line.to_string(), MessageKind::Text, None);
        log::debug!("Queued send {correlation_id} for chat {chat_id}");
    } else {
        // Socket đang rơi: đi đường REST để tin không bị mất
        match history.send_fallback(chat_id, line).await {
            Ok(message) => {
                if let Err(err) = db.cache_message(&message) {
                    log::warn!("Failed to cache message {}: {err}", message.id);
                }
                print_message(&message);
                state.apply(ChatEvent::MessageReceived(message));
            }
            Err(err) => println!("! send failed: {err}"),
        }
    }
    true
}

fn print_message(message: &ChatMessage) {
    let time = chrono::DateTime::from_timestamp(message.sent_at, 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| message.sent_at.to_string());
    match &message.file_url {
        Some(url) => println!(
            "[{time}] {}: {} ({url})",
            message.sender_role.as_str(),
            message.body
        ),
        None => println!("[{time}] {}: {}", message.sender_role.as_str(), message.body),
    }
}

fn print_connection(state: &ConnectionState) {
    match state {
        ConnectionState::Connecting => println!("-- connecting..."),
        ConnectionState::Connected => println!("-- online"),
        ConnectionState::Reconnecting { attempt } => {
            println!("-- reconnecting (attempt {attempt})")
        }
        ConnectionState::Disconnected => println!("-- offline"),
        ConnectionState::GivenUp => println!("-- offline (gave up reconnecting)"),
    }
}
