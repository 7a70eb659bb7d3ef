use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};
use std::path::Path;

use crate::common::{ChatMessage, MessageKind, SenderRole};

const DEFAULT_DB_PATH: &str = "data/session.db";

/// Lưu trữ cục bộ: token đăng nhập và cache tin nhắn để mở app offline.
pub struct SessionDatabase {
    conn: Connection,
}

impl SessionDatabase {
    /// Initialize session database at default location
    pub fn new() -> SqlResult<Self> {
        Self::with_path(DEFAULT_DB_PATH)
    }

    /// Initialize session database at custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        // Auth token table (single row)
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS auth (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                token TEXT NOT NULL,
                saved_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;

        // Cached messages table
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                chat_id INTEGER NOT NULL,
                sender_id INTEGER NOT NULL,
                sender_role TEXT NOT NULL,
                body TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_url TEXT,
                sent_at INTEGER NOT NULL,
                read_flag INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_chat_sent ON messages(chat_id, sent_at)",
            [],
        )?;

        Ok(())
    }

    /// Save or replace the auth token used at connect time
    pub fn save_auth_token(&self, token: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO auth (id, token, saved_at)
             VALUES (1, ?1, strftime('%s', 'now'))",
            params![token],
        )?;
        Ok(())
    }

    pub fn load_auth_token(&self) -> SqlResult<Option<String>> {
        self.conn
            .query_row("SELECT token FROM auth WHERE id = 1", [], |row| row.get(0))
            .optional()
    }

    pub fn clear_auth_token(&self) -> SqlResult<()> {
        self.conn.execute("DELETE FROM auth", [])?;
        Ok(())
    }

    /// Cache một tin nhắn; nhận lại tin đã có (cùng id) thì ghi đè.
    pub fn cache_message(&self, message: &ChatMessage) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO messages
             (id, chat_id, sender_id, sender_role, body, kind, file_url, sent_at, read_flag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.id,
                message.chat_id,
                message.sender_id,
                message.sender_role.as_str(),
                message.body,
                message.kind.as_str(),
                message.file_url,
                message.sent_at,
                message.read,
            ],
        )?;
        Ok(())
    }

    /// N tin mới nhất của một chat, trả về theo thứ tự thời gian tăng dần.
    pub fn recent_messages(&self, chat_id: i64, limit: usize) -> SqlResult<Vec<ChatMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, chat_id, sender_id, sender_role, body, kind, file_url, sent_at, read_flag
             FROM messages
             WHERE chat_id = ?1
             ORDER BY sent_at DESC
             LIMIT ?2",
        )?;

        let mut messages = stmt
            .query_map(params![chat_id, limit as i64], |row| {
                let role: String = row.get(3)?;
                let kind: String = row.get(5)?;
                Ok(ChatMessage {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    sender_id: row.get(2)?,
                    sender_role: SenderRole::parse(&role).unwrap_or(SenderRole::System),
                    body: row.get(4)?,
                    kind: MessageKind::parse(&kind).unwrap_or_default(),
                    file_url: row.get(6)?,
                    sent_at: row.get(7)?,
                    read: row.get(8)?,
                    correlation_id: None,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        messages.reverse();
        Ok(messages)
    }

    /// Áp read receipt vào cache: đánh dấu đã đọc các tin trong chat
    /// không do chính người đọc gửi. Trả về số dòng thay đổi.
    pub fn apply_read_receipt(&self, chat_id: i64, reader_id: i64) -> SqlResult<usize> {
        self.conn.execute(
            "UPDATE messages SET read_flag = 1
             WHERE chat_id = ?1 AND sender_id != ?2 AND read_flag = 0",
            params![chat_id, reader_id],
        )
    }
}
