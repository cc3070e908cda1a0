use crate::error::SocketError;
use bytes::Bytes;
use std::fmt::Debug;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, connect_async,
    tungstenite::{
        Utf8Bytes,
        client::IntoClientRequest,
        error::ProtocolError,
        protocol::{CloseFrame, frame::Frame},
    },
};
use tracing::debug;

/// Convenient type alias for a tungstenite `WebSocketStream`.
pub type WebSocket = tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Convenient type alias for the `Sink` half of a tungstenite [`WebSocket`].
pub type WsSink = futures::stream::SplitSink<WebSocket, WsMessage>;

/// Convenient type alias for the `Stream` half of a tungstenite [`WebSocket`].
pub type WsStream = futures::stream::SplitStream<WebSocket>;

/// Communicative type alias for a tungstenite [`WebSocket`] `Message`.
pub type WsMessage = tokio_tungstenite::tungstenite::Message;

/// Communicative type alias for a tungstenite [`WebSocket`] `Error`.
pub type WsError = tokio_tungstenite::tungstenite::Error;

/// Reduce a received [`WsMessage`] to the raw text payload that exchange routers consume.
///
/// Control frames yield `None`, a close frame yields [`SocketError::Terminated`].
pub fn process_ws_message(
    input: Result<WsMessage, WsError>,
) -> Option<Result<String, SocketError>> {
    match input {
        Ok(ws_message) => match ws_message {
            WsMessage::Text(text) => process_text(text),
            WsMessage::Binary(binary) => process_binary(binary),
            WsMessage::Ping(ping) => process_ping(ping),
            WsMessage::Pong(pong) => process_pong(pong),
            WsMessage::Close(close_frame) => process_close_frame(close_frame),
            WsMessage::Frame(frame) => process_frame(frame),
        },
        Err(ws_err) => Some(Err(SocketError::WebSocket(Box::new(ws_err)))),
    }
}

/// Process a text payload.
pub fn process_text(payload: Utf8Bytes) -> Option<Result<String, SocketError>> {
    Some(Ok(payload.to_string()))
}

/// Process a binary payload, which some venues use to carry UTF-8 JSON.
pub fn process_binary(payload: Bytes) -> Option<Result<String, SocketError>> {
    Some(
        String::from_utf8(payload.to_vec()).map_err(|error| {
            debug!(
                ?error,
                action = "returning Some(Err(err))",
                "failed to decode binary WebSocket Message as UTF-8"
            );
            SocketError::Exchange(format!("non UTF-8 binary payload: {error}"))
        }),
    )
}

/// Basic process for a [`WebSocket`] ping message. Logs the payload at `debug` level.
pub fn process_ping(ping: Bytes) -> Option<Result<String, SocketError>> {
    debug!(payload = ?ping, "received Ping WebSocket message");
    None
}

/// Basic process for a [`WebSocket`] pong message. Logs the payload at `debug` level.
pub fn process_pong(pong: Bytes) -> Option<Result<String, SocketError>> {
    debug!(payload = ?pong, "received Pong WebSocket message");
    None
}

/// Basic process for a [`WebSocket`] CloseFrame message.
pub fn process_close_frame(
    close_frame: Option<CloseFrame>,
) -> Option<Result<String, SocketError>> {
    let close_frame = format!("{close_frame:?}");
    debug!(payload = %close_frame, "received CloseFrame WebSocket message");
    Some(Err(SocketError::Terminated(close_frame)))
}

/// Basic process for a [`WebSocket`] Frame message.
pub fn process_frame(frame: Frame) -> Option<Result<String, SocketError>> {
    let frame = format!("{frame:?}");
    debug!(payload = %frame, "received unexpected Frame WebSocket message");
    None
}

/// Connect asynchronously to a [`WebSocket`] server.
pub async fn connect<R>(request: R) -> Result<WebSocket, SocketError>
where
    R: IntoClientRequest + Unpin + Debug,
{
    debug!(?request, "attempting to establish WebSocket connection");
    connect_async(request)
        .await
        .map(|(websocket, _)| websocket)
        .map_err(|error| SocketError::WebSocket(Box::new(error)))
}

/// Determine whether a [`WsError`] indicates the [`WebSocket`] has disconnected.
pub fn is_websocket_disconnected(error: &WsError) -> bool {
    matches!(
        error,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Io(_)
            | WsError::Protocol(ProtocolError::SendAfterClosing)
    )
}
