use crate::{
    credential::{Credential, CredentialKind},
    error::DataError,
    event::Table,
    exchange::{
        Connector, ExchangeChannel, ExchangeId, Frame, Op, PingInterval, Schema,
        bitmex::{
            account::{BitmexMargin, BitmexOrder, BitmexPosition},
            book::BitmexLevel,
            channel::BitmexChannel,
            instrument::BitmexInstrument,
            message::BitmexMessage,
            subscription::BitmexSubResponse,
            trade::{BitmexTrade, BitmexTradeBin},
        },
        load_items, unmapped,
    },
    registry::SymbolKey,
    serializer::{Updates, quote_bin::QuoteBinUpdate},
};
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use serde::de::{Error, Unexpected};
use std::time::Duration;
use url::Url;
use xgate_integration::protocol::{
    sign::{HexEncoder, hmac_sha256},
    websocket::WsMessage,
};

/// Account order, position & margin types for [`Bitmex`].
pub mod account;

/// `orderBookL2` level types for [`Bitmex`].
pub mod book;

/// Topics a normalised [`Table`] is subscribed through, and how they are filtered by symbol.
pub mod channel;

/// Instrument (ticker) types for [`Bitmex`].
pub mod instrument;

/// Generic [`BitmexMessage`] and frame classification.
pub mod message;

/// Command response type and response [`Validator`](xgate_integration::Validator) for
/// [`Bitmex`].
pub mod subscription;

/// Public trade & one minute trade bin types for [`Bitmex`].
pub mod trade;

/// [`Bitmex`] server base url.
///
/// See docs: <https://www.bitmex.com/app/wsAPI>
pub const BASE_URL_BITMEX: &str = "wss://ws.bitmex.com/realtime";

/// [`Bitmex`] closes connections that stay silent for more than 5 seconds.
///
/// See docs: <https://www.bitmex.com/app/wsAPI#Heartbeats>
pub const PING_INTERVAL_BITMEX: Duration = Duration::from_secs(5);

/// Validity window of an `authKeyExpires` signature.
pub const AUTH_EXPIRES: TimeDelta = TimeDelta::seconds(60);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Bitmex;

impl Bitmex {
    /// Sign the `authKeyExpires` payload: HMAC-SHA256 of `"GET/realtime" + expires`.
    pub fn signature(secret: &str, expires: i64) -> Result<String, DataError> {
        Ok(hmac_sha256(
            &HexEncoder,
            secret,
            &format!("GET/realtime{expires}"),
        )?)
    }
}

impl Connector for Bitmex {
    const ID: ExchangeId = ExchangeId::Bitmex;
    type Message = BitmexMessage;
    type SubResponse = BitmexSubResponse;

    fn schemas() -> &'static [Schema] {
        &[Schema::Margin]
    }

    fn url(schema: Schema) -> Result<Url, DataError> {
        if !Self::supports(schema) {
            return Err(DataError::Config(format!(
                "{} does not serve schema: {schema}",
                Self::ID
            )));
        }
        Url::parse(BASE_URL_BITMEX).map_err(|error| DataError::Config(error.to_string()))
    }

    fn parse(payload: &str) -> Result<Frame<Self::Message, Self::SubResponse>, DataError> {
        message::parse(payload)
    }

    fn tables(_: Schema, tag: &str) -> &'static [Table] {
        match tag {
            "instrument" => &[Table::Symbol, Table::Position],
            "trade" => &[Table::Trade, Table::QuoteBin],
            "tradeBin1m" => &[Table::QuoteBin],
            "orderBookL2" | "orderBookL2_25" => &[Table::OrderBook],
            "order" => &[Table::Order],
            "position" => &[Table::Position],
            "margin" => &[Table::Wallet, Table::WalletExtra],
            _ => &[],
        }
    }

    fn updates(_: Schema, table: Table, message: &Self::Message) -> Result<Updates, DataError> {
        let data = &message.data;

        let updates = match (table, message.table.as_str()) {
            (Table::Symbol, "instrument") => Updates::Symbol(
                load_items::<BitmexInstrument>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Position, "instrument") => Updates::Position(
                load_items::<BitmexInstrument>(table, data)
                    .iter()
                    .filter_map(BitmexInstrument::mark_update)
                    .collect(),
            ),
            (Table::Trade, "trade") => Updates::Trade(
                load_items::<BitmexTrade>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::QuoteBin, "trade") => Updates::QuoteBin(
                load_items::<BitmexTrade>(table, data)
                    .into_iter()
                    .map(QuoteBinUpdate::from)
                    .collect(),
            ),
            (Table::QuoteBin, "tradeBin1m") => Updates::QuoteBin(
                load_items::<BitmexTradeBin>(table, data)
                    .into_iter()
                    .map(QuoteBinUpdate::from)
                    .collect(),
            ),
            (Table::OrderBook, "orderBookL2" | "orderBookL2_25") => Updates::OrderBook(
                load_items::<BitmexLevel>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Order, "order") => Updates::Order(
                load_items::<BitmexOrder>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Position, "position") => Updates::Position(
                load_items::<BitmexPosition>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::Wallet, "margin") => Updates::Wallet(
                load_items::<BitmexMargin>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (Table::WalletExtra, "margin") => Updates::WalletExtra(
                load_items::<BitmexMargin>(table, data)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            (table, tag) => return Err(unmapped(table, tag)),
        };

        Ok(updates)
    }

    fn channels(
        _: Schema,
        table: Table,
        key: &SymbolKey,
    ) -> Result<Vec<ExchangeChannel>, DataError> {
        Ok(BitmexChannel::topics(table)
            .iter()
            .map(|topic| topic.channel(key))
            .collect())
    }

    fn ping_interval() -> Option<PingInterval> {
        Some(PingInterval {
            interval: tokio::time::interval(PING_INTERVAL_BITMEX),
            ping: || WsMessage::text("ping"),
        })
    }

    fn requests(op: Op, channels: &[ExchangeChannel], _: u64) -> Vec<WsMessage> {
        let op = match op {
            Op::Subscribe => "subscribe",
            Op::Unsubscribe => "unsubscribe",
        };

        vec![WsMessage::text(
            serde_json::json!({
                "op": op,
                "args": channels.iter().map(AsRef::<str>::as_ref).collect_vec(),
            })
            .to_string(),
        )]
    }

    fn auth_request(
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<Option<WsMessage>, DataError> {
        if credential.kind == CredentialKind::ListenKey {
            return Err(DataError::Credential(format!(
                "{} authenticates with an api key, not a listen key",
                Self::ID
            )));
        }

        let expires = (now + AUTH_EXPIRES).timestamp();
        let signature = Self::signature(&credential.secret, expires)?;

        Ok(Some(WsMessage::text(
            serde_json::json!({
                "op": "authKeyExpires",
                "args": [credential.key, expires, signature],
            })
            .to_string(),
        )))
    }
}

impl<'de> serde::Deserialize<'de> for Bitmex {
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

impl serde::Serialize for Bitmex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(Self::ID.as_str())
    }
}
