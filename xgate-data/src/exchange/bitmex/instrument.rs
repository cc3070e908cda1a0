use crate::serializer::{position::PositionUpdate, symbol::SymbolUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Instrument push. Updates carry only the fields that changed.
///
/// ### Raw Payload Examples
/// See docs: <https://www.bitmex.com/app/wsAPI#Instrument>
/// #### Instrument update payload
/// ```json
/// {
///     "table": "instrument",
///     "action": "update",
///     "data": [
///         {
///             "symbol": "XBTUSD",
///             "markPrice": 24571.12,
///             "indicativeSettlePrice": 24568.4,
///             "timestamp": "2023-02-18T09:28:00.000Z"
///         }
///     ]
/// }
///```
#[derive(Clone, PartialEq, PartialOrd, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitmexInstrument {
    pub symbol: SmolStr,
    pub last_price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub mark_price: Option<f64>,
    pub indicative_settle_price: Option<f64>,
    #[serde(rename = "prevPrice24h")]
    pub prev_price_24h: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    #[serde(rename = "volume24h")]
    pub volume_24h: Option<f64>,
    #[serde(rename = "turnover24h")]
    pub turnover_24h: Option<f64>,
    pub open_interest: Option<f64>,
    pub funding_rate: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<BitmexInstrument> for SymbolUpdate {
    fn from(instrument: BitmexInstrument) -> Self {
        Self {
            symbol: instrument.symbol,
            price: instrument.last_price,
            bid_price: instrument.bid_price,
            ask_price: instrument.ask_price,
            mark_price: instrument.mark_price,
            index_price: instrument.indicative_settle_price,
            open: instrument.prev_price_24h,
            high: instrument.high_price,
            low: instrument.low_price,
            volume: instrument.volume_24h,
            volume_quote: instrument.turnover_24h,
            open_interest: instrument.open_interest,
            funding_rate: instrument.funding_rate,
            time: instrument.timestamp,
        }
    }
}

impl BitmexInstrument {
    /// Mark price refresh of an open position, if the push carries a mark price.
    pub fn mark_update(&self) -> Option<PositionUpdate> {
        self.mark_price.map(|mark_price| PositionUpdate {
            symbol: self.symbol.clone(),
            mark_price: Some(mark_price),
            time: self.timestamp,
            mark_only: true,
            ..Default::default()
        })
    }
}
