use self::{
    account::{
        BinanceAccountPosition, BinanceAccountUpdate, BinanceExecutionReport,
        BinanceOrderTradeUpdate,
    },
    book::BinanceDepthUpdate,
    message::BinanceMessage,
    subscription::BinanceSubResponse,
    ticker::{BinanceMarkPrice, BinanceTicker},
    trade::{BinanceKline, BinanceTrade},
};
use crate::{
    credential::{Credential, CredentialKind},
    error::DataError,
    event::Table,
    exchange::{
        Connector, ExchangeChannel, ExchangeId, Frame, Op, Schema, load_items, unmapped,
    },
    registry::SymbolKey,
    serializer::{Updates, quote_bin::QuoteBinUpdate},
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::de::{Error, Unexpected};
use url::Url;
use xgate_integration::protocol::websocket::WsMessage;

/// Account order, balance & position types for [`Binance`].
pub mod account;

/// Diff depth level types for [`Binance`].
pub mod book;

/// Streams a normalised [`Table`] is subscribed through.
pub mod channel;

/// Generic [`BinanceMessage`] and frame classification.
pub mod message;

/// Command response type and response [`Validator`](xgate_integration::Validator) for
/// [`Binance`].
pub mod subscription;

/// Rolling 24hr ticker & futures mark price types for [`Binance`].
pub mod ticker;

/// Public trade & kline types for [`Binance`].
pub mod trade;

/// [`Binance`] spot & margin server base url.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#websocket-market-streams>
pub const BASE_URL_BINANCE_SPOT: &str = "wss://stream.binance.com:9443/ws";

/// [`Binance`] USD-M futures server base url.
///
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#websocket-market-streams>
pub const BASE_URL_BINANCE_FUTURES_USD: &str = "wss://fstream.binance.com/ws";

/// [`Binance`] COIN-M futures server base url.
///
/// See docs: <https://binance-docs.github.io/apidocs/delivery/en/#websocket-market-streams>
pub const BASE_URL_BINANCE_FUTURES_COIN: &str = "wss://dstream.binance.com/ws";

/// Binance exchange serving every [`Schema`].
///
/// ### Notes
/// Private tables are delivered over the user data stream, addressed by a listen key appended
/// to the base url. No socket command authenticates the connection.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Binance;

impl Binance {
    /// Base url string of the server for the [`Schema`].
    pub fn base_url(schema: Schema) -> &'static str {
        match schema {
            Schema::Exchange | Schema::MarginCross | Schema::MarginIsolated => {
                BASE_URL_BINANCE_SPOT
            }
            Schema::Margin => BASE_URL_BINANCE_FUTURES_USD,
            Schema::MarginCoin => BASE_URL_BINANCE_FUTURES_COIN,
        }
    }
}

impl Connector for Binance {
    const ID: ExchangeId = ExchangeId::Binance;
    type Message = BinanceMessage;
    type SubResponse = BinanceSubResponse;

    fn schemas() -> &'static [Schema] {
        &[
            Schema::Exchange,
            Schema::MarginCross,
            Schema::MarginIsolated,
            Schema::Margin,
            Schema::MarginCoin,
        ]
    }

    fn url(schema: Schema) -> Result<Url, DataError> {
        Url::parse(Self::base_url(schema)).map_err(|error| DataError::Config(error.to_string()))
    }

    fn stream_url(schema: Schema, credential: Option<&Credential>) -> Result<Url, DataError> {
        match credential {
            Some(credential) if credential.kind == CredentialKind::ListenKey => Url::parse(
                &format!("{}/{}", Self::base_url(schema), credential.key),
            )
            .map_err(|error| DataError::Config(error.to_string())),
            _ => Self::url(schema),
        }
    }

    fn parse(payload: &str) -> Result<Frame<Self::Message, Self::SubResponse>, DataError> {
        message::parse(payload)
    }

    fn tables(schema: Schema, tag: &str) -> &'static [Table] {
        let futures = schema.is_futures();

        match tag {
            "24hrTicker" => match schema {
                Schema::MarginCross | Schema::MarginIsolated => &[Table::Symbol, Table::Position],
                _ => &[Table::Symbol],
            },
            "markPriceUpdate" if futures => &[Table::Symbol, Table::Position],
            "trade" | "aggTrade" => &[Table::Trade, Table::QuoteBin],
            "kline" => &[Table::QuoteBin],
            "depthUpdate" => &[Table::OrderBook],
            "executionReport" if !futures => &[Table::Order],
            "ORDER_TRADE_UPDATE" if futures => &[Table::Order],
            "outboundAccountPosition" if !futures => &[Table::Wallet, Table::WalletExtra],
            "ACCOUNT_UPDATE" if futures => &[Table::Position, Table::Wallet, Table::WalletExtra],
            _ => &[],
        }
    }

    fn updates(_: Schema, table: Table, message: &Self::Message) -> Result<Updates, DataError> {
        let data = &message.data;

        let updates = match (table, message.tag.as_str()) {
            (Table::Symbol, "24hrTicker") => Updates::Symbol(
                load_items::<BinanceTicker>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Symbol, "markPriceUpdate") => Updates::Symbol(
                load_items::<BinanceMarkPrice>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Position, "24hrTicker") => Updates::Position(
                load_items::<BinanceTicker>(table, data)
                    .iter()
                    .filter_map(BinanceTicker::mark_update)
                    .collect(),
            ),
            (Table::Position, "markPriceUpdate") => Updates::Position(
                load_items::<BinanceMarkPrice>(table, data)
                    .iter()
                    .filter_map(BinanceMarkPrice::mark_update)
                    .collect(),
            ),
            (Table::Trade, "trade" | "aggTrade") => Updates::Trade(
                load_items::<BinanceTrade>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::QuoteBin, "trade" | "aggTrade") => Updates::QuoteBin(
                load_items::<BinanceTrade>(table, data)
                    .into_iter()
                    .map(QuoteBinUpdate::from)
                    .collect(),
            ),
            (Table::QuoteBin, "kline") => Updates::QuoteBin(
                load_items::<BinanceKline>(table, data)
                    .into_iter()
                    .filter_map(BinanceKline::into_update)
                    .collect(),
            ),
            (Table::OrderBook, "depthUpdate") => Updates::OrderBook(
                load_items::<BinanceDepthUpdate>(table, data)
                    .into_iter()
                    .flat_map(BinanceDepthUpdate::into_levels)
                    .collect(),
            ),
            (Table::Order, "executionReport") => Updates::Order(
                load_items::<BinanceExecutionReport>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Order, "ORDER_TRADE_UPDATE") => Updates::Order(
                load_items::<BinanceOrderTradeUpdate>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Position, "ACCOUNT_UPDATE") => Updates::Position(
                load_items::<BinanceAccountUpdate>(table, data)
                    .iter()
                    .flat_map(BinanceAccountUpdate::positions)
                    .collect(),
            ),
            (Table::Wallet, "ACCOUNT_UPDATE") => Updates::Wallet(
                load_items::<BinanceAccountUpdate>(table, data)
                    .iter()
                    .flat_map(BinanceAccountUpdate::balances)
                    .collect(),
            ),
            (Table::WalletExtra, "ACCOUNT_UPDATE") => Updates::WalletExtra(
                load_items::<BinanceAccountUpdate>(table, data)
                    .iter()
                    .flat_map(BinanceAccountUpdate::balances)
                    .collect(),
            ),
            (Table::Wallet, "outboundAccountPosition") => Updates::Wallet(
                load_items::<BinanceAccountPosition>(table, data)
                    .into_iter()
                    .flat_map(BinanceAccountPosition::into_balances)
                    .collect(),
            ),
            (Table::WalletExtra, "outboundAccountPosition") => Updates::WalletExtra(
                load_items::<BinanceAccountPosition>(table, data)
                    .into_iter()
                    .flat_map(BinanceAccountPosition::into_balances)
                    .collect(),
            ),
            (table, tag) => return Err(unmapped(table, tag)),
        };

        Ok(updates)
    }

    fn channels(
        schema: Schema,
        table: Table,
        key: &SymbolKey,
    ) -> Result<Vec<ExchangeChannel>, DataError> {
        channel::channels(schema, table, key)
    }

    fn requests(op: Op, channels: &[ExchangeChannel], request_id: u64) -> Vec<WsMessage> {
        if channels.is_empty() {
            return vec![];
        }

        let method = match op {
            Op::Subscribe => "SUBSCRIBE",
            Op::Unsubscribe => "UNSUBSCRIBE",
        };

        vec![WsMessage::text(
            serde_json::json!({
                "method": method,
                "params": channels.iter().map(AsRef::<str>::as_ref).collect_vec(),
                "id": request_id,
            })
            .to_string(),
        )]
    }

    fn expected_responses(channels: &[ExchangeChannel]) -> usize {
        usize::from(!channels.is_empty())
    }

    fn auth_request(
        credential: &Credential,
        _: DateTime<Utc>,
    ) -> Result<Option<WsMessage>, DataError> {
        match credential.kind {
            CredentialKind::ListenKey => Ok(None),
            _ => Err(DataError::Credential(format!(
                "{} user data streams require a listen key",
                Self::ID
            ))),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Binance {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let input = <String as serde::Deserialize>::deserialize(deserializer)?;
        let expected = Self::ID.as_str();

        if input == expected {
            Ok(Self)
        } else {
            Err(Error::invalid_value(Unexpected::Str(&input), &expected))
        }
    }
}

impl serde::Serialize for Binance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(Self::ID.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol_str::SmolStr;

    #[test]
    fn test_binance_tables() {
        struct TestCase {
            schema: Schema,
            tag: &'static str,
            expected: &'static [Table],
        }

        let tests = vec![
            TestCase {
                // TC0: spot ticker feeds symbols only
                schema: Schema::Exchange,
                tag: "24hrTicker",
                expected: &[Table::Symbol],
            },
            TestCase {
                // TC1: margin ticker refreshes position marks
                schema: Schema::MarginCross,
                tag: "24hrTicker",
                expected: &[Table::Symbol, Table::Position],
            },
            TestCase {
                // TC2: futures account update
                schema: Schema::Margin,
                tag: "ACCOUNT_UPDATE",
                expected: &[Table::Position, Table::Wallet, Table::WalletExtra],
            },
            TestCase {
                // TC3: futures order event on a spot connection
                schema: Schema::Exchange,
                tag: "ORDER_TRADE_UPDATE",
                expected: &[],
            },
            TestCase {
                // TC4: spot balances
                schema: Schema::MarginIsolated,
                tag: "outboundAccountPosition",
                expected: &[Table::Wallet, Table::WalletExtra],
            },
            TestCase {
                // TC5: unknown tag
                schema: Schema::MarginCoin,
                tag: "bookTicker",
                expected: &[],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Binance::tables(test.schema, test.tag);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_binance_requests() {
        let channels = Binance::channels(
            Schema::Margin,
            Table::Symbol,
            &SymbolKey::Symbol(SmolStr::new("BTCUSDT")),
        )
        .unwrap();

        assert_eq!(Binance::expected_responses(&channels), 1);

        let actual = Binance::requests(Op::Subscribe, &channels, 42);
        assert_eq!(actual.len(), 1);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(actual[0].to_text().unwrap()).unwrap(),
            serde_json::json!({
                "method": "SUBSCRIBE",
                "params": ["btcusdt@ticker", "btcusdt@markPrice"],
                "id": 42
            })
        );

        assert!(Binance::requests(Op::Unsubscribe, &[], 43).is_empty());
        assert_eq!(Binance::expected_responses(&[]), 0);
    }

    #[test]
    fn test_binance_urls() {
        struct TestCase {
            schema: Schema,
            credential: Option<Credential>,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: spot public stream
                schema: Schema::Exchange,
                credential: None,
                expected: "wss://stream.binance.com:9443/ws",
            },
            TestCase {
                // TC1: usd futures user data stream
                schema: Schema::Margin,
                credential: Some(Credential::listen_key("pqia91ma19a5s61cv6a81va65sdf19v8")),
                expected: "wss://fstream.binance.com/ws/pqia91ma19a5s61cv6a81va65sdf19v8",
            },
            TestCase {
                // TC2: coin futures with api key stays on the public stream
                schema: Schema::MarginCoin,
                credential: Some(Credential::api_key("key", "secret")),
                expected: "wss://dstream.binance.com/ws",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Binance::stream_url(test.schema, test.credential.as_ref()).unwrap();
            assert_eq!(actual.as_str(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_binance_auth_request() {
        let now = Utc::now();

        assert_eq!(
            Binance::auth_request(&Credential::listen_key("key"), now),
            Ok(None)
        );
        assert!(matches!(
            Binance::auth_request(&Credential::api_key("key", "secret"), now),
            Err(DataError::Credential(_))
        ));
    }

    #[test]
    fn test_binance_updates() {
        let message = BinanceMessage {
            tag: "depthUpdate".to_string(),
            data: vec![serde_json::json!({
                "e": "depthUpdate", "E": 1671656397761u64, "s": "BTCUSDT",
                "U": 22611425143u64, "u": 22611425151u64,
                "b": [["16858.90000000", "13.69582000"]],
                "a": [["16864.30000000", "0.00000000"]]
            })],
        };

        let Ok(Updates::OrderBook(levels)) =
            Binance::updates(Schema::Exchange, Table::OrderBook, &message)
        else {
            panic!("expected order book updates");
        };
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1].volume, Some(0.0));

        assert!(matches!(
            Binance::updates(Schema::Exchange, Table::Trade, &message),
            Err(DataError::Serializer { .. })
        ));
    }
}
