use crate::{
    event::Side,
    serializer::{
        order::{OrderStatus, OrderUpdate},
        position::PositionUpdate,
        wallet::BalanceUpdate,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};
use xgate_integration::de::{de_opt_str, de_str, de_u64_epoch_ms_as_datetime_utc};

/// Spot & margin user data order update.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#payload-order-update>
/// ```json
/// {
///     "e": "executionReport",
///     "E": 1499405658658,
///     "s": "ETHBTC",
///     "c": "mUvoqJxFIILMdfAW5iGSOW",
///     "S": "BUY",
///     "o": "LIMIT",
///     "q": "1.00000000",
///     "p": "0.10264410",
///     "P": "0.00000000",
///     "X": "NEW",
///     "i": 4293153,
///     "z": "0.00000000",
///     "Z": "0.00000000",
///     "T": 1499405658657
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceExecutionReport {
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(rename = "c", default)]
    pub client_order_id: Option<SmolStr>,
    #[serde(rename = "S")]
    pub side: Side,
    #[serde(rename = "o")]
    pub kind: SmolStr,
    #[serde(rename = "q", deserialize_with = "de_str")]
    pub quantity: f64,
    #[serde(rename = "p", deserialize_with = "de_str")]
    pub price: f64,
    #[serde(rename = "P", default, deserialize_with = "de_opt_str")]
    pub stop_price: Option<f64>,
    #[serde(rename = "X")]
    pub status: OrderStatus,
    #[serde(rename = "i")]
    pub order_id: u64,
    #[serde(rename = "z", deserialize_with = "de_str")]
    pub filled_quantity: f64,
    #[serde(rename = "Z", default, deserialize_with = "de_opt_str")]
    pub filled_quote: Option<f64>,
    #[serde(rename = "T", deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
}

impl From<BinanceExecutionReport> for OrderUpdate {
    fn from(report: BinanceExecutionReport) -> Self {
        let average_price = report
            .filled_quote
            .filter(|_| report.filled_quantity > 0.0)
            .map(|quote| quote / report.filled_quantity);

        Self {
            order_id: format_smolstr!("{}", report.order_id),
            client_order_id: report.client_order_id,
            symbol: Some(report.symbol),
            status: Some(report.status),
            side: Some(report.side),
            kind: Some(report.kind),
            price: Some(report.price).filter(|price| *price > 0.0),
            stop_price: report.stop_price.filter(|price| *price > 0.0),
            volume: Some(report.quantity),
            filled_volume: Some(report.filled_quantity),
            average_price,
            time: Some(report.time),
        }
    }
}

/// Futures user data order update.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#event-order-update>
/// ```json
/// {
///     "e": "ORDER_TRADE_UPDATE",
///     "E": 1568879465651,
///     "T": 1568879465650,
///     "o": {
///         "s": "BTCUSDT",
///         "c": "TEST",
///         "S": "SELL",
///         "o": "TRAILING_STOP_MARKET",
///         "q": "0.001",
///         "p": "0",
///         "ap": "0",
///         "sp": "7103.04",
///         "X": "NEW",
///         "i": 8886774,
///         "z": "0",
///         "T": 1568879465650
///     }
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceOrderTradeUpdate {
    #[serde(rename = "o")]
    pub order: BinanceFuturesOrder,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceFuturesOrder {
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(rename = "c", default)]
    pub client_order_id: Option<SmolStr>,
    #[serde(rename = "S")]
    pub side: Side,
    #[serde(rename = "o")]
    pub kind: SmolStr,
    #[serde(rename = "q", deserialize_with = "de_str")]
    pub quantity: f64,
    #[serde(rename = "p", deserialize_with = "de_str")]
    pub price: f64,
    #[serde(rename = "ap", default, deserialize_with = "de_opt_str")]
    pub average_price: Option<f64>,
    #[serde(rename = "sp", default, deserialize_with = "de_opt_str")]
    pub stop_price: Option<f64>,
    #[serde(rename = "X")]
    pub status: OrderStatus,
    #[serde(rename = "i")]
    pub order_id: u64,
    #[serde(rename = "z", deserialize_with = "de_str")]
    pub filled_quantity: f64,
    #[serde(rename = "T", deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
}

impl From<BinanceOrderTradeUpdate> for OrderUpdate {
    fn from(update: BinanceOrderTradeUpdate) -> Self {
        let order = update.order;
        let positive = |value: Option<f64>| value.filter(|value| *value > 0.0);

        Self {
            order_id: format_smolstr!("{}", order.order_id),
            client_order_id: order.client_order_id,
            symbol: Some(order.symbol),
            status: Some(order.status),
            side: Some(order.side),
            kind: Some(order.kind),
            price: positive(Some(order.price)),
            stop_price: positive(order.stop_price),
            volume: Some(order.quantity),
            filled_volume: Some(order.filled_quantity),
            average_price: positive(order.average_price),
            time: Some(order.time),
        }
    }
}

/// Spot & margin user data balance update of every changed asset.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#payload-account-update>
/// ```json
/// {
///     "e": "outboundAccountPosition",
///     "E": 1564034571105,
///     "u": 1564034571073,
///     "B": [
///         {"a": "ETH", "f": "10000.000000", "l": "0.000000"}
///     ]
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceAccountPosition {
    #[serde(rename = "E", deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
    #[serde(rename = "B")]
    pub balances: Vec<BinanceSpotBalance>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceSpotBalance {
    #[serde(rename = "a")]
    pub asset: SmolStr,
    #[serde(rename = "f", deserialize_with = "de_str")]
    pub free: f64,
    #[serde(rename = "l", deserialize_with = "de_str")]
    pub locked: f64,
}

impl BinanceAccountPosition {
    pub fn into_balances(self) -> impl Iterator<Item = BalanceUpdate> {
        let time = self.time;
        self.balances.into_iter().map(move |balance| BalanceUpdate {
            currency: balance.asset,
            balance: Some(balance.free + balance.locked),
            available: Some(balance.free),
            reserved: Some(balance.locked),
            unrealised_pnl: None,
            time: Some(time),
        })
    }
}

/// Futures user data balance & position update.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#event-balance-and-position-update>
/// ```json
/// {
///     "e": "ACCOUNT_UPDATE",
///     "E": 1564745798939,
///     "T": 1564745798938,
///     "a": {
///         "m": "ORDER",
///         "B": [
///             {"a": "USDT", "wb": "122624.12345678", "cw": "100.12345678", "bc": "50.12345678"}
///         ],
///         "P": [
///             {
///                 "s": "BTCUSDT",
///                 "pa": "0",
///                 "ep": "0.00000",
///                 "up": "0",
///                 "mt": "isolated",
///                 "ps": "BOTH"
///             }
///         ]
///     }
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceAccountUpdate {
    #[serde(rename = "E", deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
    #[serde(rename = "a")]
    pub account: BinanceAccountUpdateInner,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceAccountUpdateInner {
    #[serde(rename = "B", default)]
    pub balances: Vec<BinanceFuturesBalance>,
    #[serde(rename = "P", default)]
    pub positions: Vec<BinanceFuturesPosition>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceFuturesBalance {
    #[serde(rename = "a")]
    pub asset: SmolStr,
    #[serde(rename = "wb", deserialize_with = "de_str")]
    pub wallet_balance: f64,
    #[serde(rename = "cw", default, deserialize_with = "de_opt_str")]
    pub cross_wallet_balance: Option<f64>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BinanceFuturesPosition {
    #[serde(rename = "s")]
    pub symbol: SmolStr,
    #[serde(rename = "pa", deserialize_with = "de_str")]
    pub amount: f64,
    #[serde(rename = "ep", default, deserialize_with = "de_opt_str")]
    pub entry_price: Option<f64>,
    #[serde(rename = "up", default, deserialize_with = "de_opt_str")]
    pub unrealised_pnl: Option<f64>,
    #[serde(rename = "mt", default)]
    pub margin_type: Option<SmolStr>,
}

impl BinanceAccountUpdate {
    pub fn balances(&self) -> impl Iterator<Item = BalanceUpdate> + '_ {
        self.account.balances.iter().map(|balance| BalanceUpdate {
            currency: balance.asset.clone(),
            balance: Some(balance.wallet_balance),
            available: balance.cross_wallet_balance,
            reserved: None,
            unrealised_pnl: None,
            time: Some(self.time),
        })
    }

    pub fn positions(&self) -> impl Iterator<Item = PositionUpdate> + '_ {
        self.account.positions.iter().map(|position| PositionUpdate {
            symbol: position.symbol.clone(),
            size: Some(position.amount),
            entry_price: position.entry_price.filter(|price| *price > 0.0),
            unrealised_pnl: position.unrealised_pnl,
            cross: position
                .margin_type
                .as_deref()
                .map(|margin_type| margin_type.eq_ignore_ascii_case("cross")),
            time: Some(self.time),
            ..Default::default()
        })
    }
}
