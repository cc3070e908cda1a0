use crate::{
    event::Side,
    serializer::{
        quote_bin::{QuoteBin, QuoteBinUpdate},
        trade::PublicTrade,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

/// Binance real-time trade or aggregated trade message.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#trade-streams>
/// #### Spot Side::Buy Trade
/// ```json
/// {
///     "e":"trade",
///     "E":1649324825173,
///     "s":"ETHUSDT",
///     "t":1000000000,
///     "p":"10000.19",
///     "q":"0.239000",
///     "T":1749354825200,
///     "m":false,
///     "M":true
/// }
/// ```
///
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#aggregate-trade-streams>
/// #### FuturePerpetual Side::Sell AggTrade
/// ```json
/// {
///     "e": "aggTrade",
///     "E": 123456789,
///     "s": "BTCUSDT",
///     "a": 5933014,
///     "p": "0.001",
///     "q": "100",
///     "f": 100,
///     "l": 105,
///     "T": 123456785,
///     "m": true
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceTrade {
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(
        rename = "T",
        deserialize_with = "xgate_integration::de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,
    #[serde(rename = "t", default)]
    pub trade_id: Option<u64>,
    #[serde(rename = "a", default)]
    pub aggregate_id: Option<u64>,
    #[serde(rename = "p", deserialize_with = "xgate_integration::de::de_str")]
    pub price: f64,
    #[serde(rename = "q", deserialize_with = "xgate_integration::de::de_str")]
    pub amount: f64,
    #[serde(rename = "m", deserialize_with = "de_side_from_buyer_is_maker")]
    pub side: Side,
}

impl From<BinanceTrade> for PublicTrade {
    fn from(trade: BinanceTrade) -> Self {
        let id = trade
            .trade_id
            .or(trade.aggregate_id)
            .map(|id| format_smolstr!("{id}"))
            .unwrap_or_default();

        Self {
            symbol: trade.symbol,
            id,
            price: trade.price,
            volume: trade.amount,
            side: Some(trade.side),
            time: trade.time,
        }
    }
}

impl From<BinanceTrade> for QuoteBinUpdate {
    fn from(trade: BinanceTrade) -> Self {
        QuoteBinUpdate::Tick {
            symbol: trade.symbol,
            time: trade.time,
            price: trade.price,
            volume: trade.amount,
        }
    }
}

/// Deserialize a [`BinanceTrade`] "buyer_is_maker" boolean field to a [`Side`] of the
/// aggressor.
///
/// Variants:
/// buyer_is_maker => aggressor is a seller => Side::Sell
/// !buyer_is_maker => aggressor is a buyer => Side::Buy
pub fn de_side_from_buyer_is_maker<'de, D>(deserializer: D) -> Result<Side, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(|buyer_is_maker| {
        if buyer_is_maker {
            Side::Sell
        } else {
            Side::Buy
        }
    })
}

/// Binance candlestick message. Only the one minute interval feeds quote bins.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#kline-candlestick-streams>
/// ```json
/// {
///     "e": "kline",
///     "E": 1672515782136,
///     "s": "BNBBTC",
///     "k": {
///         "t": 1672515780000,
///         "T": 1672515839999,
///         "s": "BNBBTC",
///         "i": "1m",
///         "o": "0.0010",
///         "c": "0.0020",
///         "h": "0.0025",
///         "l": "0.0015",
///         "v": "1000",
///         "n": 100,
///         "x": false
///     }
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceKline {
    #[serde(rename = "k")]
    pub kline: BinanceKlineInner,
}

#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceKlineInner {
    #[serde(
        rename = "t",
        deserialize_with = "xgate_integration::de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub start: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(rename = "i")]
    pub interval: SmolStr,
    #[serde(rename = "o", deserialize_with = "xgate_integration::de::de_str")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "xgate_integration::de::de_str")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "xgate_integration::de::de_str")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "xgate_integration::de::de_str")]
    pub close: f64,
    #[serde(rename = "v", deserialize_with = "xgate_integration::de::de_str")]
    pub volume: f64,
    #[serde(rename = "x")]
    pub closed: bool,
}

impl BinanceKline {
    pub const INTERVAL: &'static str = "1m";

    pub fn into_update(self) -> Option<QuoteBinUpdate> {
        let kline = self.kline;
        (kline.interval == Self::INTERVAL).then(|| QuoteBinUpdate::Bar {
            bin: QuoteBin {
                symbol: kline.symbol,
                time: kline.start,
                open: kline.open,
                high: kline.high,
                low: kline.low,
                close: kline.close,
                volume: kline.volume,
            },
            closed: kline.closed,
        })
    }
}
