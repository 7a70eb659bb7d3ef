use thiserror::Error;

/// Phân loại lỗi của tầng chat realtime.
///
/// Mọi lỗi cuối cùng đều được trình bày cho consumer dưới dạng chuỗi
/// qua `ChatEvent::ErrorReported`; enum này giữ nguồn gốc tách bạch
/// cho log và test.
#[derive(Debug, Error)]
pub enum ChatError {
    /// URL sai, I/O fail hoặc handshake quá hạn khi kết nối
    #[error("connection failed: {0}")]
    Connection(String),
    /// Payload từ server không decode được; bị log rồi bỏ, không lan lên UI
    #[error("malformed server payload: {0}")]
    Decode(String),
    /// Server chủ động báo lỗi qua event `error`
    #[error("server reported: {0}")]
    Server(String),
}
