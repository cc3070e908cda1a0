use serde::{Deserialize, Serialize};
use xgate_integration::{Validator, error::SocketError};

/// Acknowledgement of a BitMEX `subscribe`, `unsubscribe` or `authKeyExpires` command.
///
/// ### Raw Payload Examples
/// See docs: <https://www.bitmex.com/app/wsAPI#Response-Format>
/// #### Subscription response payload
/// ```json
/// {
///     "success": true,
///     "subscribe": "trade:XBTUSD",
///     "request": {
///         "op":"subscribe",
///         "args":[
///             "trade:XBTUSD"
///         ]
///     }
/// }
///```
/// #### Error payload
/// ```json
/// {
///     "status": 400,
///     "error": "Unknown table: trades",
///     "meta": {},
///     "request": {"op": "subscribe", "args": ["trades:XBTUSD"]}
/// }
///```
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub struct BitmexSubResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(alias = "unsubscribe")]
    pub subscribe: Option<String>,
    pub error: Option<String>,
}

impl Validator for BitmexSubResponse {
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized,
    {
        if self.success {
            Ok(self)
        } else {
            Err(SocketError::Subscribe(format!(
                "received failure response for {} command: {}",
                self.subscribe.as_deref().unwrap_or("unknown"),
                self.error.as_deref().unwrap_or("no reason given"),
            )))
        }
    }
}
