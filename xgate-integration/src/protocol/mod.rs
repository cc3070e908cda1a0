/// Contains useful `WebSocket` type aliases, frame processing utilities and a connect function.
pub mod websocket;

/// HMAC request signing used to authenticate private exchange streams.
pub mod sign;
