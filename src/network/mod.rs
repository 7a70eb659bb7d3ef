pub mod client;
pub mod protocol;
pub mod reconnect;
pub mod transport;

pub use client::RealtimeClient;
pub use reconnect::ReconnectPolicy;
