use crate::{
    error::DataError,
    event::Action,
    exchange::{Control, ExchangeMessage, Frame, binance::subscription::BinanceSubResponse},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic [`Binance`](super::Binance) event push, tagged by the `"e"` event type. All-market
/// streams deliver an array of events sharing one tag.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#all-market-tickers-stream>
/// #### All market tickers
/// ```json
/// [
///     {"e": "24hrTicker", "E": 1672515782136, "s": "BTCUSDT", "c": "16550.10"},
///     {"e": "24hrTicker", "E": 1672515782136, "s": "ETHUSDT", "c": "1200.52"}
/// ]
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceMessage {
    pub tag: String,
    pub data: Vec<Value>,
}

impl ExchangeMessage for BinanceMessage {
    fn tag(&self) -> &str {
        &self.tag
    }

    /// Binance pushes carry no action, every event updates state.
    fn action(&self) -> Action {
        Action::Update
    }
}

/// User data events after which the listen key stream is closed by the server.
const CONTROL_EVENTS: [&str; 2] = ["listenKeyExpired", "serverShutdown"];

fn event_tag(item: &Value) -> Option<&str> {
    item.get("e").and_then(Value::as_str)
}

/// Classify a raw Binance payload.
///
/// Combined stream `{"stream": .., "data": ..}` wrappers are unwrapped first.
pub fn parse(payload: &str) -> Result<Frame<BinanceMessage, BinanceSubResponse>, DataError> {
    let mut value = serde_json::from_str::<Value>(payload)?;

    if let Some(data) = value
        .as_object_mut()
        .filter(|object| object.contains_key("stream"))
        .and_then(|object| object.remove("data"))
    {
        value = data;
    }

    match value {
        Value::Array(data) => {
            let Some(tag) = data.first().and_then(event_tag).map(str::to_owned) else {
                return Ok(Frame::Ignore);
            };
            Ok(Frame::Data(BinanceMessage { tag, data }))
        }
        value @ Value::Object(_) => parse_object(value),
        _ => Ok(Frame::Ignore),
    }
}

fn parse_object(value: Value) -> Result<Frame<BinanceMessage, BinanceSubResponse>, DataError> {
    let is_response = value.get("id").is_some()
        && (value.get("result").is_some() || value.get("error").is_some());

    if let Some(tag) = event_tag(&value).map(str::to_owned) {
        if CONTROL_EVENTS.contains(&tag.as_str()) {
            return Ok(Frame::Control(Control::Closed(format!(
                "user data stream closed: {tag}"
            ))));
        }
        return Ok(Frame::Data(BinanceMessage {
            tag,
            data: vec![value],
        }));
    }

    if is_response {
        return Ok(Frame::Response(serde_json::from_value(value)?));
    }

    Ok(Frame::Ignore)
}
