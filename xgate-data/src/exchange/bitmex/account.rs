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
use smol_str::SmolStr;

/// Normalised currency code and the divisor converting BitMEX minor units into it.
///
/// eg/ balances in `XBt` are satoshis.
pub fn currency_scale(currency: &str) -> (SmolStr, f64) {
    match currency {
        "XBt" => (SmolStr::new_static("BTC"), 1e8),
        "USDt" => (SmolStr::new_static("USDT"), 1e6),
        "Gwei" => (SmolStr::new_static("ETH"), 1e9),
        other => (SmolStr::new(other.to_uppercase()), 1.0),
    }
}

/// ### Raw Payload Examples
/// See docs: <https://www.bitmex.com/app/wsAPI#Order>
/// #### Order payload
/// ```json
/// {
///     "orderID": "57cbb0a8-7d2b-4cb7-9c7c-3ed2b6a0e1f4",
///     "clOrdID": "mm-bot-1",
///     "symbol": "XBTUSD",
///     "side": "Buy",
///     "ordType": "Limit",
///     "price": 24000,
///     "orderQty": 100,
///     "cumQty": 0,
///     "ordStatus": "New",
///     "timestamp": "2023-02-18T09:28:00.000Z"
/// }
///```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitmexOrder {
    #[serde(rename = "orderID")]
    pub order_id: SmolStr,
    #[serde(rename = "clOrdID", default)]
    pub client_order_id: Option<SmolStr>,
    #[serde(default)]
    pub symbol: Option<SmolStr>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub ord_type: Option<SmolStr>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "stopPx", default)]
    pub stop_price: Option<f64>,
    #[serde(default)]
    pub order_qty: Option<f64>,
    #[serde(default)]
    pub cum_qty: Option<f64>,
    #[serde(rename = "avgPx", default)]
    pub average_price: Option<f64>,
    #[serde(default)]
    pub ord_status: Option<OrderStatus>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<BitmexOrder> for OrderUpdate {
    fn from(order: BitmexOrder) -> Self {
        Self {
            order_id: order.order_id,
            client_order_id: order.client_order_id.filter(|id| !id.is_empty()),
            symbol: order.symbol,
            status: order.ord_status,
            side: order.side,
            kind: order.ord_type,
            price: order.price,
            stop_price: order.stop_price,
            volume: order.order_qty,
            filled_volume: order.cum_qty,
            average_price: order.average_price,
            time: order.timestamp,
        }
    }
}

/// ### Raw Payload Examples
/// See docs: <https://www.bitmex.com/app/wsAPI#Position>
/// #### Position payload
/// ```json
/// {
///     "account": 2,
///     "symbol": "XBTUSD",
///     "currency": "XBt",
///     "currentQty": -100,
///     "avgEntryPrice": 24000,
///     "leverage": 10,
///     "crossMargin": false,
///     "liquidationPrice": 26100.5,
///     "markPrice": 24050,
///     "unrealisedPnl": -8663,
///     "timestamp": "2023-02-18T09:28:00.000Z"
/// }
///```
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BitmexPosition {
    pub symbol: SmolStr,
    pub currency: Option<SmolStr>,
    pub current_qty: Option<f64>,
    pub avg_entry_price: Option<f64>,
    pub leverage: Option<f64>,
    pub cross_margin: Option<bool>,
    pub liquidation_price: Option<f64>,
    pub mark_price: Option<f64>,
    pub unrealised_pnl: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<BitmexPosition> for PositionUpdate {
    fn from(position: BitmexPosition) -> Self {
        let scale = position
            .currency
            .as_deref()
            .map_or(1.0, |currency| currency_scale(currency).1);

        Self {
            symbol: position.symbol,
            size: position.current_qty,
            entry_price: position.avg_entry_price,
            leverage: position.leverage,
            liquidation_price: position.liquidation_price,
            mark_price: position.mark_price,
            unrealised_pnl: position.unrealised_pnl.map(|pnl| pnl / scale),
            cross: position.cross_margin,
            time: position.timestamp,
            mark_only: false,
        }
    }
}

/// ### Raw Payload Examples
/// See docs: <https://www.bitmex.com/app/wsAPI#Margin>
/// #### Margin payload
/// ```json
/// {
///     "account": 2,
///     "currency": "XBt",
///     "walletBalance": 150000000,
///     "availableMargin": 100000000,
///     "initMargin": 20000000,
///     "unrealisedPnl": -8663,
///     "timestamp": "2023-02-18T09:28:00.000Z"
/// }
///```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitmexMargin {
    pub currency: SmolStr,
    #[serde(default)]
    pub wallet_balance: Option<f64>,
    #[serde(default)]
    pub available_margin: Option<f64>,
    #[serde(default)]
    pub init_margin: Option<f64>,
    #[serde(default)]
    pub unrealised_pnl: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<BitmexMargin> for BalanceUpdate {
    fn from(margin: BitmexMargin) -> Self {
        let (currency, scale) = currency_scale(&margin.currency);
        let scaled = |value: Option<f64>| value.map(|value| value / scale);

        Self {
            currency,
            balance: scaled(margin.wallet_balance),
            available: scaled(margin.available_margin),
            reserved: scaled(margin.init_margin),
            unrealised_pnl: scaled(margin.unrealised_pnl),
            time: margin.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;

        #[test]
        fn test_bitmex_order() {
            struct TestCase {
                input: &'static str,
                expected: OrderUpdate,
            }

            let tests = vec![
                TestCase {
                    // TC0: new order
                    input: r#"
                    {
                        "orderID": "57cbb0a8-7d2b-4cb7-9c7c-3ed2b6a0e1f4",
                        "clOrdID": "",
                        "symbol": "XBTUSD",
                        "side": "Buy",
                        "ordType": "Limit",
                        "price": 24000,
                        "stopPx": null,
                        "orderQty": 100,
                        "cumQty": 0,
                        "ordStatus": "New"
                    }
                    "#,
                    expected: OrderUpdate {
                        order_id: SmolStr::new("57cbb0a8-7d2b-4cb7-9c7c-3ed2b6a0e1f4"),
                        symbol: Some(SmolStr::new("XBTUSD")),
                        status: Some(OrderStatus::New),
                        side: Some(Side::Buy),
                        kind: Some(SmolStr::new("Limit")),
                        price: Some(24000.0),
                        volume: Some(100.0),
                        filled_volume: Some(0.0),
                        ..Default::default()
                    },
                },
                TestCase {
                    // TC1: partial fill carrying changed fields only
                    input: r#"
                    {
                        "orderID": "57cbb0a8-7d2b-4cb7-9c7c-3ed2b6a0e1f4",
                        "ordStatus": "PartiallyFilled",
                        "cumQty": 40,
                        "avgPx": 24000
                    }
                    "#,
                    expected: OrderUpdate {
                        order_id: SmolStr::new("57cbb0a8-7d2b-4cb7-9c7c-3ed2b6a0e1f4"),
                        status: Some(OrderStatus::PartiallyFilled),
                        filled_volume: Some(40.0),
                        average_price: Some(24000.0),
                        ..Default::default()
                    },
                },
            ];

            for (index, test) in tests.into_iter().enumerate() {
                let actual =
                    OrderUpdate::from(serde_json::from_str::<BitmexOrder>(test.input).unwrap());
                assert_eq!(actual, test.expected, "TC{} failed", index);
            }
        }

        #[test]
        fn test_bitmex_position_scales_pnl() {
            let input = r#"
            {
                "account": 2,
                "symbol": "XBTUSD",
                "currency": "XBt",
                "currentQty": -100,
                "avgEntryPrice": 24000,
                "leverage": 10,
                "crossMargin": false,
                "unrealisedPnl": -50000000
            }
            "#;

            let actual = PositionUpdate::from(serde_json::from_str::<BitmexPosition>(input).unwrap());
            assert_eq!(actual.size, Some(-100.0));
            assert_eq!(actual.unrealised_pnl, Some(-0.5));
            assert_eq!(actual.cross, Some(false));
            assert_eq!(actual.mark_price, None);
        }

        #[test]
        fn test_bitmex_margin() {
            let input = r#"
            {
                "account": 2,
                "currency": "XBt",
                "walletBalance": 150000000,
                "availableMargin": 100000000,
                "timestamp": "2023-02-18T09:28:00.000Z"
            }
            "#;

            let actual = BalanceUpdate::from(serde_json::from_str::<BitmexMargin>(input).unwrap());
            assert_eq!(actual.currency, "BTC");
            assert_eq!(actual.balance, Some(1.5));
            assert_eq!(actual.available, Some(1.0));
            assert_eq!(actual.reserved, None);
        }
    }
}
