use crate::{
    credential::Credential,
    error::DataError,
    event::{Action, Table},
    registry::SymbolKey,
    serializer::Updates,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use smol_str::SmolStr;
use std::{
    fmt::{Debug, Display, Formatter},
    time::Duration,
};
use tracing::trace;
use url::Url;
use xgate_integration::{Validator, protocol::websocket::WsMessage};

/// `Binance` [`Connector`] covering spot, margin and futures schemas.
pub mod binance;

/// `BitMEX` [`Connector`] for the `margin` schema.
pub mod bitmex;

/// Default [`Duration`] the [`Connection`](crate::supervisor::Connection) will wait to receive
/// every acknowledgement for an outbound command.
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Unique identifier for an exchange server.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    Binance,
    Bitmex,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Bitmex => "bitmex",
        }
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market-type tag distinguishing trading contexts, since normalisation rules differ per
/// [`Schema`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Spot.
    Exchange,
    /// Cross margin.
    MarginCross,
    /// Isolated margin.
    MarginIsolated,
    /// Linear (quote margined) futures.
    Margin,
    /// Coin margined futures.
    MarginCoin,
}

impl Schema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Schema::Exchange => "exchange",
            Schema::MarginCross => "margin_cross",
            Schema::MarginIsolated => "margin_isolated",
            Schema::Margin => "margin",
            Schema::MarginCoin => "margin_coin",
        }
    }

    /// Determines if the [`Schema`] is a derivatives (futures) market.
    pub fn is_futures(&self) -> bool {
        matches!(self, Schema::Margin | Schema::MarginCoin)
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an outbound subscription command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Op {
    Subscribe,
    Unsubscribe,
}

/// Exchange specific channel name an outbound command is issued for.
///
/// eg/ `ExchangeChannel("trade:XBTUSD")`, `ExchangeChannel("btcusdt@aggTrade")`
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct ExchangeChannel(pub SmolStr);

impl AsRef<str> for ExchangeChannel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ExchangeChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classified transport frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<Message, Response> {
    /// Data push to be routed to the serializers.
    Data(Message),
    /// Acknowledgement (or rejection) of an outbound command.
    Response(Response),
    /// Control frame signalling the consumer should stop.
    Control(Control),
    /// Welcome banners, heartbeats and anything else carrying no data.
    Ignore,
}

/// Reason an exchange signalled the stream is over.
#[derive(Debug, Clone, Eq, PartialEq, Display)]
pub enum Control {
    /// The exchange throttled the connection.
    #[display("rate limited: {_0}")]
    RateLimited(String),
    /// The session was closed or invalidated, eg/ an expired listen key.
    #[display("closed: {_0}")]
    Closed(String),
}

/// Structured exchange message carrying an exchange specific tag used for table lookup.
pub trait ExchangeMessage {
    /// Exchange `table` / `event` tag (eg/ "orderBookL2", "depthUpdate").
    fn tag(&self) -> &str;

    /// [`Action`] communicated by the exchange for the whole message.
    fn action(&self) -> Action;
}

/// Defines the exchange specific protocol of a venue: where to connect, how to classify frames,
/// the static tag to [`Table`] catalogue, and how to translate a normalised
/// `(Table, SymbolKey)` into outbound commands.
pub trait Connector
where
    Self: Clone + Default + Debug + Send + Sized,
{
    /// Unique identifier for the exchange server being connected with.
    const ID: ExchangeId;

    /// Structured data message produced by [`Self::parse`].
    type Message: ExchangeMessage + Debug + Send;

    /// Acknowledgement frame for outbound commands. Implements [`Validator`] in order to
    /// determine if the command was accepted.
    type SubResponse: Validator + Debug + DeserializeOwned + Send;

    /// [`Schema`]s served by the exchange.
    fn schemas() -> &'static [Schema];

    /// Determines if the exchange serves the provided [`Schema`].
    fn supports(schema: Schema) -> bool {
        Self::schemas().contains(&schema)
    }

    /// Base [`Url`] of the public stream server for the [`Schema`].
    fn url(schema: Schema) -> Result<Url, DataError>;

    /// [`Url`] to connect with when the connection carries a [`Credential`]. Exchanges binding
    /// the account to the stream address (eg/ a listen key path) override this.
    fn stream_url(schema: Schema, _credential: Option<&Credential>) -> Result<Url, DataError> {
        Self::url(schema)
    }

    /// Classify a raw text payload into a [`Frame`].
    fn parse(payload: &str) -> Result<Frame<Self::Message, Self::SubResponse>, DataError>;

    /// Static exchange tag to [`Table`] catalogue for the [`Schema`]. Unknown tags yield an
    /// empty slice.
    fn tables(schema: Schema, tag: &str) -> &'static [Table];

    /// Extract the normalised [`Updates`] for one [`Table`] branch of a message.
    fn updates(schema: Schema, table: Table, message: &Self::Message)
    -> Result<Updates, DataError>;

    /// Exchange channels carrying the `(Table, SymbolKey)` pair. An empty collection means the
    /// data arrives without an explicit command (eg/ account streams bound at connect time).
    fn channels(
        schema: Schema,
        table: Table,
        key: &SymbolKey,
    ) -> Result<Vec<ExchangeChannel>, DataError>;

    /// Defines [`PingInterval`] of custom application-level pings for the exchange server being
    /// connected with.
    ///
    /// Defaults to `None`, meaning that no custom pings are sent.
    fn ping_interval() -> Option<PingInterval> {
        None
    }

    /// Build the outbound command payloads for the channels.
    fn requests(op: Op, channels: &[ExchangeChannel], request_id: u64) -> Vec<WsMessage>;

    /// Number of acknowledgements expected in response to [`Self::requests`].
    fn expected_responses(channels: &[ExchangeChannel]) -> usize {
        channels.len()
    }

    /// Build the authentication request for the [`Credential`], if the exchange authenticates
    /// over the socket. `Ok(None)` means the credential is already bound to the connection.
    fn auth_request(
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<Option<WsMessage>, DataError>;

    /// Expected [`Duration`] to wait for every acknowledgement of a command.
    fn subscription_timeout() -> Duration {
        DEFAULT_SUBSCRIPTION_TIMEOUT
    }
}

/// Defines the frequency and construction function for custom
/// [`WebSocket`](xgate_integration::protocol::websocket::WebSocket) pings.
#[derive(Debug)]
pub struct PingInterval {
    pub interval: tokio::time::Interval,
    pub ping: fn() -> WsMessage,
}

/// Deserialise every raw item of a message into `T`, skipping items that do not match the
/// expected shape.
pub fn load_items<T>(table: Table, data: &[serde_json::Value]) -> Vec<T>
where
    T: DeserializeOwned,
{
    data.iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(item) => Some(item),
            Err(error) => {
                trace!(%table, ?error, ?item, "skipping item failing validation");
                None
            }
        })
        .collect()
}

/// Build the [`DataError`] returned when a tag is routed to a [`Table`] it cannot feed.
pub(crate) fn unmapped(table: Table, tag: &str) -> DataError {
    DataError::serializer(table, format!("no {table} mapping for exchange tag: {tag}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_schema() {
        struct TestCase {
            input: &'static str,
            expected: Option<Schema>,
        }

        let tests = vec![
            TestCase {
                // TC0: spot
                input: r#""exchange""#,
                expected: Some(Schema::Exchange),
            },
            TestCase {
                // TC1: coin margined futures
                input: r#""margin_coin""#,
                expected: Some(Schema::MarginCoin),
            },
            TestCase {
                // TC2: isolated margin
                input: r#""margin_isolated""#,
                expected: Some(Schema::MarginIsolated),
            },
            TestCase {
                // TC3: unknown
                input: r#""options""#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<Schema>(test.input).ok();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_load_items_skips_malformed() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Item {
            symbol: String,
            size: f64,
        }

        let data = vec![
            serde_json::json!({"symbol": "XBTUSD", "size": 10.0}),
            serde_json::json!({"symbol": "XBTUSD"}),
            serde_json::json!({"symbol": "ETHUSD", "size": 5.0}),
        ];

        let actual = load_items::<Item>(Table::Trade, &data);
        assert_eq!(
            actual,
            vec![
                Item {
                    symbol: "XBTUSD".to_string(),
                    size: 10.0
                },
                Item {
                    symbol: "ETHUSD".to_string(),
                    size: 5.0
                },
            ]
        );
    }
}
