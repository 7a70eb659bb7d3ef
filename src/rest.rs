use serde::Deserialize;

use crate::common::ChatMessage;

const DEFAULT_PAGE_SIZE: usize = 50;

/// REST client cho lịch sử chat và gửi fallback khi realtime chưa sẵn sàng.
///
/// Tầng phiên không biết gì về module này; composition root dùng nó như
/// một black box cạnh kết nối realtime.
pub struct HistoryClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    messages: Vec<ChatMessage>,
}

impl HistoryClient {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            auth_token: auth_token.into(),
        }
    }

    /// Một trang lịch sử, mới nhất trước; `before_id` là con trỏ phân trang.
    pub async fn fetch_page(
        &self,
        chat_id: i64,
        before_id: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, reqwest::Error> {
        let mut request = self
            .http
            .get(format!("{}/chats/{chat_id}/messages", self.base_url))
            .bearer_auth(&self.auth_token)
            .query(&[("limit", limit.unwrap_or(DEFAULT_PAGE_SIZE).to_string())]);
        if let Some(before_id) = before_id {
            request = request.query(&[("beforeId", before_id.to_string())]);
        }

        let page = request
            .send()
            .await?
            .error_for_status()?
            .json::<HistoryPage>()
            .await?;
        Ok(page.messages)
    }

    /// Gửi tin nhắn qua REST khi socket đang rơi; server vẫn phát
    /// `new_message` cho các client đang online.
    pub async fn send_fallback(
        &self,
        chat_id: i64,
        body: &str,
    ) -> Result<ChatMessage, reqwest::Error> {
        self.http
            .post(format!("{}/chats/{chat_id}/messages", self.base_url))
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({ "message": body, "messageType": "text" }))
            .send()
            .await?
            .error_for_status()?
            .json::<ChatMessage>()
            .await
    }
}
