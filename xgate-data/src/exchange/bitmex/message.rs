use crate::{
    error::DataError,
    event::Action,
    exchange::{Control, ExchangeMessage, Frame, bitmex::subscription::BitmexSubResponse},
};
use serde::{Deserialize, Serialize};

/// Generic [`Bitmex`](super::Bitmex) table push. Items are kept raw until the
/// [`Table`](crate::event::Table) branch they feed is known.
///
/// ### Raw Payload Examples
/// See docs: <https://www.bitmex.com/app/wsAPI#Response-Format>
/// #### Trade payload
/// ```json
/// {
///     "table": "trade",
///     "action": "insert",
///     "data": [
///         {
///             "timestamp": "2023-02-18T09:27:59.701Z",
///             "symbol": "XBTUSD",
///             "side": "Sell",
///             "size": 200,
///             "price": 24564.5,
///             "trdMatchID": "31e50cb7-e005-a44e-f354-86e88dff52eb"
///         }
///     ]
/// }
///```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BitmexMessage {
    pub table: String,
    pub action: Action,
    pub data: Vec<serde_json::Value>,
}

impl ExchangeMessage for BitmexMessage {
    fn tag(&self) -> &str {
        &self.table
    }

    fn action(&self) -> Action {
        self.action
    }
}

/// Union of every frame shape the BitMEX realtime api sends, used to classify a payload.
#[derive(Debug, Default, Deserialize)]
struct BitmexFrame {
    table: Option<String>,
    action: Option<Action>,
    data: Option<Vec<serde_json::Value>>,
    success: Option<bool>,
    subscribe: Option<String>,
    unsubscribe: Option<String>,
    status: Option<u16>,
    error: Option<String>,
    request: Option<serde_json::Value>,
}

/// Error statuses after which the connection is unusable.
const CONTROL_STATUSES: [u16; 3] = [401, 403, STATUS_RATE_LIMITED];

const STATUS_RATE_LIMITED: u16 = 429;

/// Classify a raw BitMEX payload.
///
/// Heartbeat `pong`s and the welcome banner are [`Frame::Ignore`]d. Authentication and rate
/// limit errors are [`Frame::Control`].
pub fn parse(payload: &str) -> Result<Frame<BitmexMessage, BitmexSubResponse>, DataError> {
    if payload.trim() == "pong" {
        return Ok(Frame::Ignore);
    }

    let frame = serde_json::from_str::<BitmexFrame>(payload)?;

    if let (Some(table), Some(action), Some(data)) = (frame.table, frame.action, frame.data) {
        return Ok(Frame::Data(BitmexMessage {
            table,
            action,
            data,
        }));
    }

    if let Some(status) = frame.status.filter(|status| CONTROL_STATUSES.contains(status)) {
        let reason = format!("status {status}: {}", frame.error.unwrap_or_default());
        return Ok(Frame::Control(match status {
            STATUS_RATE_LIMITED => Control::RateLimited(reason),
            _ => Control::Closed(reason),
        }));
    }

    if frame.success.is_some() || (frame.status.is_some() && frame.request.is_some()) {
        return Ok(Frame::Response(BitmexSubResponse {
            success: frame.success.unwrap_or(false),
            subscribe: frame.subscribe.or(frame.unsubscribe),
            error: frame.error,
        }));
    }

    Ok(Frame::Ignore)
}
