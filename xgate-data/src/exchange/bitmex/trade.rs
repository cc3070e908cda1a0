use crate::{
    event::Side,
    serializer::{
        quote_bin::{BIN_SIZE, QuoteBin, QuoteBinUpdate},
        trade::PublicTrade,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

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
///             "tickDirection": "MinusTick",
///             "trdMatchID": "31e50cb7-e005-a44e-f354-86e88dff52eb",
///             "grossValue": 814184,
///             "homeNotional": 0.00814184,
///             "foreignNotional": 200,
///             "trdType": "Regular"
///         }
///     ]
/// }
///```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BitmexTrade {
    pub timestamp: DateTime<Utc>,
    pub symbol: SmolStr,
    pub side: Option<Side>,
    #[serde(rename = "size")]
    pub amount: f64,
    pub price: f64,

    #[serde(rename = "trdMatchID")]
    pub id: SmolStr,
}

impl From<BitmexTrade> for PublicTrade {
    fn from(trade: BitmexTrade) -> Self {
        Self {
            symbol: trade.symbol,
            id: trade.id,
            price: trade.price,
            volume: trade.amount,
            side: trade.side,
            time: trade.timestamp,
        }
    }
}

impl From<BitmexTrade> for QuoteBinUpdate {
    fn from(trade: BitmexTrade) -> Self {
        QuoteBinUpdate::Tick {
            symbol: trade.symbol,
            time: trade.timestamp,
            price: trade.price,
            volume: trade.amount,
        }
    }
}

/// Closed one minute bar.
///
/// ### Raw Payload Examples
/// #### TradeBin1m payload
/// ```json
/// {
///     "timestamp": "2023-02-18T09:28:00.000Z",
///     "symbol": "XBTUSD",
///     "open": 24560,
///     "high": 24570.5,
///     "low": 24555,
///     "close": 24564.5,
///     "trades": 42,
///     "volume": 120000
/// }
///```
///
/// The `timestamp` is the close of the bar.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BitmexTradeBin {
    pub timestamp: DateTime<Utc>,
    pub symbol: SmolStr,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<BitmexTradeBin> for QuoteBinUpdate {
    fn from(bin: BitmexTradeBin) -> Self {
        QuoteBinUpdate::Bar {
            bin: QuoteBin {
                symbol: bin.symbol,
                time: bin.timestamp - BIN_SIZE,
                open: bin.open,
                high: bin.high,
                low: bin.low,
                close: bin.close,
                volume: bin.volume,
            },
            closed: true,
        }
    }
}
