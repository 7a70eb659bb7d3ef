use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::ChatError;

/// Handshake không được treo quá giới hạn này, kể cả khi transport bên dưới
/// không tự đặt timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Mở một kết nối WebSocket đã xác thực tới backend hỗ trợ.
///
/// Token được gắn out-of-band vào query string lúc handshake.
pub async fn connect_transport(server_url: &str, auth_token: &str) -> Result<WsStream, ChatError> {
    let mut url = Url::parse(server_url)
        .map_err(|err| ChatError::Connection(format!("invalid server url {server_url}: {err}")))?;
    url.query_pairs_mut().append_pair("token", auth_token);

    match timeout(CONNECT_TIMEOUT, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(err)) => Err(ChatError::Connection(err.to_string())),
        Err(_) => Err(ChatError::Connection(format!(
            "handshake timed out after {}s",
            CONNECT_TIMEOUT.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_yields_a_connection_error() {
        match connect_transport("not a url at all", "token").await {
            Err(ChatError::Connection(message)) => {
                assert!(message.contains("invalid server url"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a connection error"),
        }
    }

    #[tokio::test]
    async fn refused_connection_yields_a_connection_error() {
        // Cổng 1 trên loopback không có listener
        let result = connect_transport("ws://127.0.0.1:1/ws", "token").await;
        assert!(matches!(result, Err(ChatError::Connection(_))));
    }
}
