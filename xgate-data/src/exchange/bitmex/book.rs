use crate::{event::Side, serializer::order_book::LevelUpdate};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// ### Raw Payload Examples
/// See docs: <https://www.bitmex.com/app/wsAPI#OrderBookL2>
/// #### OrderBookL2 update payload
/// ```json
/// {
///     "table": "orderBookL2",
///     "action": "update",
///     "data": [
///         {"symbol": "XBTUSD", "id": 8799502350, "side": "Sell", "size": 0, "price": 24976.5},
///         {"symbol": "XBTUSD", "id": 8799502400, "side": "Buy", "size": 3200, "price": 24976}
///     ]
/// }
///```
///
/// Rows of a `delete` message carry no `size`.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BitmexLevel {
    pub symbol: SmolStr,
    pub side: Side,
    pub price: f64,
    #[serde(default)]
    pub size: Option<f64>,
}

impl From<BitmexLevel> for LevelUpdate {
    fn from(level: BitmexLevel) -> Self {
        Self {
            symbol: level.symbol,
            side: level.side,
            price: level.price,
            volume: level.size,
        }
    }
}
