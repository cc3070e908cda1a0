use thiserror::Error;

/// All socket IO related errors generated in `xgate-integration`.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Sink error")]
    Sink,

    #[error("Deserialising JSON error: {error} for payload: {payload}")]
    Deserialise {
        error: serde_json::Error,
        payload: String,
    },

    #[error("Serialising JSON error: {0}")]
    Serialise(serde_json::Error),

    #[error("error parsing Url: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("error subscribing to resources over the socket: {0}")]
    Subscribe(String),

    #[error("subscription acknowledgement timeout reached after {0:?}")]
    SubscribeTimeout(std::time::Duration),

    #[error("ExchangeStream terminated with closing frame: {0}")]
    Terminated(String),

    #[error("{entity} does not support: {item}")]
    Unsupported { entity: &'static str, item: String },

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("consumed unidentifiable message: {0}")]
    Unidentifiable(String),

    #[error("consumed error message from exchange: {0}")]
    Exchange(String),

    #[error("invalid signing key: {0}")]
    Signature(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for SocketError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

impl SocketError {
    /// Determines if the [`SocketError`] means the underlying transport can no longer be used.
    pub fn is_disconnect(&self) -> bool {
        match self {
            SocketError::WebSocket(error) => {
                crate::protocol::websocket::is_websocket_disconnected(error)
            }
            SocketError::Terminated(_) | SocketError::Sink => true,
            _ => false,
        }
    }
}
