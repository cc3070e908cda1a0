use crate::{event::Side, serializer::order_book::LevelUpdate};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// [`Binance`](super::Binance) OrderBook level.
///
/// #### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#partial-book-depth-streams>
/// ```json
/// ["4.00000200", "12.00000000"]
/// ```
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceLevel(
    #[serde(deserialize_with = "xgate_integration::de::de_str")] pub f64,
    #[serde(deserialize_with = "xgate_integration::de::de_str")] pub f64,
);

/// Binance diff depth push. A level with zero quantity is removed from the book.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#diff-depth-stream>
/// ```json
/// {
///     "e": "depthUpdate",
///     "E": 1671656397761,
///     "s": "BTCUSDT",
///     "U": 22611425143,
///     "u": 22611425151,
///     "b": [["16858.90000000", "13.69582000"]],
///     "a": [["16859.00000000", "1.65491000"], ["16864.30000000", "0.00000000"]]
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceDepthUpdate {
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(rename = "b", default)]
    pub bids: Vec<BinanceLevel>,
    #[serde(rename = "a", default)]
    pub asks: Vec<BinanceLevel>,
}

impl BinanceDepthUpdate {
    pub fn into_levels(self) -> impl Iterator<Item = LevelUpdate> {
        let symbol = self.symbol;
        let bids = self.bids.into_iter().map(|level| (Side::Buy, level));
        let asks = self.asks.into_iter().map(|level| (Side::Sell, level));

        bids.chain(asks)
            .map(move |(side, BinanceLevel(price, amount))| LevelUpdate {
                symbol: symbol.clone(),
                side,
                price,
                volume: Some(amount),
            })
    }
}
