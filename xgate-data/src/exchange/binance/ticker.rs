use crate::serializer::{position::PositionUpdate, symbol::SymbolUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use xgate_integration::de::{de_opt_str, de_u64_epoch_ms_as_datetime_utc};

/// Binance rolling 24hr ticker. Futures tickers carry no best bid & ask.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#individual-symbol-ticker-streams>
/// ```json
/// {
///     "e": "24hrTicker",
///     "E": 1672515782136,
///     "s": "BTCUSDT",
///     "p": "0.0015",
///     "c": "16550.10",
///     "b": "16550.00",
///     "a": "16550.20",
///     "o": "16400.00",
///     "h": "16600.00",
///     "l": "16350.00",
///     "v": "10000",
///     "q": "165000000"
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceTicker {
    #[serde(rename = "E", deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(rename = "c", default, deserialize_with = "de_opt_str")]
    pub last: Option<f64>,
    #[serde(rename = "b", default, deserialize_with = "de_opt_str")]
    pub bid: Option<f64>,
    #[serde(rename = "a", default, deserialize_with = "de_opt_str")]
    pub ask: Option<f64>,
    #[serde(rename = "o", default, deserialize_with = "de_opt_str")]
    pub open: Option<f64>,
    #[serde(rename = "h", default, deserialize_with = "de_opt_str")]
    pub high: Option<f64>,
    #[serde(rename = "l", default, deserialize_with = "de_opt_str")]
    pub low: Option<f64>,
    #[serde(rename = "v", default, deserialize_with = "de_opt_str")]
    pub volume: Option<f64>,
    #[serde(rename = "q", default, deserialize_with = "de_opt_str")]
    pub volume_quote: Option<f64>,
}

impl From<BinanceTicker> for SymbolUpdate {
    fn from(ticker: BinanceTicker) -> Self {
        Self {
            symbol: ticker.symbol,
            price: ticker.last,
            bid_price: ticker.bid,
            ask_price: ticker.ask,
            open: ticker.open,
            high: ticker.high,
            low: ticker.low,
            volume: ticker.volume,
            volume_quote: ticker.volume_quote,
            time: Some(ticker.time),
            ..Default::default()
        }
    }
}

impl BinanceTicker {
    /// Margin positions are valued at the last traded price.
    pub fn mark_update(&self) -> Option<PositionUpdate> {
        self.last.map(|last| PositionUpdate {
            symbol: self.symbol.clone(),
            mark_price: Some(last),
            time: Some(self.time),
            mark_only: true,
            ..Default::default()
        })
    }
}

/// Binance futures mark price & funding push.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#mark-price-stream>
/// ```json
/// {
///     "e": "markPriceUpdate",
///     "E": 1562305380000,
///     "s": "BTCUSDT",
///     "p": "11794.15000000",
///     "i": "11784.62659091",
///     "P": "11784.25641265",
///     "r": "0.00038167",
///     "T": 1562306400000
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceMarkPrice {
    #[serde(rename = "E", deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(rename = "p", default, deserialize_with = "de_opt_str")]
    pub mark_price: Option<f64>,
    #[serde(rename = "i", default, deserialize_with = "de_opt_str")]
    pub index_price: Option<f64>,
    #[serde(rename = "r", default, deserialize_with = "de_opt_str")]
    pub funding_rate: Option<f64>,
}

impl From<BinanceMarkPrice> for SymbolUpdate {
    fn from(mark: BinanceMarkPrice) -> Self {
        Self {
            symbol: mark.symbol,
            mark_price: mark.mark_price,
            index_price: mark.index_price,
            funding_rate: mark.funding_rate,
            time: Some(mark.time),
            ..Default::default()
        }
    }
}

impl BinanceMarkPrice {
    pub fn mark_update(&self) -> Option<PositionUpdate> {
        self.mark_price.map(|mark_price| PositionUpdate {
            symbol: self.symbol.clone(),
            mark_price: Some(mark_price),
            time: Some(self.time),
            mark_only: true,
            ..Default::default()
        })
    }
}
