use crate::error::DataError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tracing::debug;
use url::Url;
use xgate_integration::{
    error::SocketError,
    protocol::websocket::{WebSocket, WsMessage, connect, process_ws_message},
};

/// Bidirectional text frame transport a [`Connection`](super::Connection) drives.
///
/// Implemented for a tungstenite [`WebSocket`]. Tests substitute an in-memory transport.
#[async_trait]
pub trait Transport
where
    Self: Send,
{
    /// Write an outbound command frame.
    async fn send(&mut self, message: WsMessage) -> Result<(), DataError>;

    /// Next inbound text payload. `None` means the transport has closed.
    async fn recv(&mut self) -> Option<Result<String, DataError>>;

    async fn close(&mut self) -> Result<(), DataError>;
}

#[async_trait]
impl Transport for WebSocket {
    async fn send(&mut self, message: WsMessage) -> Result<(), DataError> {
        SinkExt::send(self, message)
            .await
            .map_err(|error| DataError::from(SocketError::from(error)))
    }

    async fn recv(&mut self) -> Option<Result<String, DataError>> {
        loop {
            let result = self.next().await?;
            if let Some(payload) = process_ws_message(result) {
                return Some(payload.map_err(DataError::from));
            }
        }
    }

    async fn close(&mut self) -> Result<(), DataError> {
        WebSocket::close(self, None)
            .await
            .map_err(|error| DataError::from(SocketError::from(error)))
    }
}

/// Open a [`WebSocket`] to the provided [`Url`].
pub async fn connect_websocket(url: Url) -> Result<WebSocket, DataError> {
    debug!(%url, "connecting WebSocket transport");
    connect(url).await.map_err(DataError::from)
}
