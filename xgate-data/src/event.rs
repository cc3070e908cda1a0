use crate::{
    exchange::Schema,
    serializer::{
        order::Order,
        order_book::Level,
        position::Position,
        quote_bin::QuoteBin,
        symbol::SymbolRecord,
        trade::PublicTrade,
        wallet::{Balance, WalletExtra},
    },
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Normalised event kind an [`Envelope`] carries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Symbol,
    Trade,
    QuoteBin,
    OrderBook,
    Order,
    Position,
    Wallet,
    WalletExtra,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Symbol,
        Table::Trade,
        Table::QuoteBin,
        Table::OrderBook,
        Table::Order,
        Table::Position,
        Table::Wallet,
        Table::WalletExtra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Symbol => "symbol",
            Table::Trade => "trade",
            Table::QuoteBin => "quote_bin",
            Table::OrderBook => "order_book",
            Table::Order => "order",
            Table::Position => "position",
            Table::Wallet => "wallet",
            Table::WalletExtra => "wallet_extra",
        }
    }

    /// Account scoped tables that are only delivered over an authenticated connection.
    pub fn is_private(&self) -> bool {
        matches!(
            self,
            Table::Order | Table::Position | Table::Wallet | Table::WalletExtra
        )
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change semantics of an [`Envelope`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Full snapshot replacing everything previously known.
    Partial,
    Insert,
    Update,
    Delete,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Partial => "partial",
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
        })
    }
}

/// [`Side`] of a trade, order or order book level - Buy or Sell.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side {
    #[serde(alias = "buy", alias = "BUY", alias = "Bid", alias = "bid")]
    Buy,
    #[serde(alias = "sell", alias = "SELL", alias = "Ask", alias = "ask")]
    Sell,
}

impl Side {
    /// Numeric discriminant used when deriving order book level identifiers.
    pub fn ordinal(&self) -> u64 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        })
    }
}

/// Uniform output unit delivered to consumers.
///
/// `data` is never empty for an emitted [`Envelope`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Envelope {
    pub account: SmolStr,
    pub table: Table,
    pub schema: Schema,
    pub action: Action,
    pub data: Vec<Record>,
}

/// Normalised record carried by an [`Envelope`], one variant per [`Table`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Record {
    Symbol(SymbolRecord),
    Trade(PublicTrade),
    QuoteBin(QuoteBin),
    OrderBook(Level),
    Order(Order),
    Position(Position),
    Wallet(Balance),
    WalletExtra(WalletExtra),
}

impl Record {
    /// Exchange symbol the record relates to, if it is symbol scoped.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Record::Symbol(record) => Some(&record.symbol),
            Record::Trade(trade) => Some(&trade.symbol),
            Record::QuoteBin(bin) => Some(&bin.symbol),
            Record::OrderBook(level) => Some(&level.symbol),
            Record::Order(order) => Some(&order.symbol),
            Record::Position(position) => Some(&position.symbol),
            Record::Wallet(_) | Record::WalletExtra(_) => None,
        }
    }
}

/// Group of records sharing one [`Action`], produced by a serializer for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub action: Action,
    pub records: Vec<Record>,
}

/// Collects `(Action, Record)` pairs into [`Batch`]es, one per distinct [`Action`], ordered by
/// the first occurrence of each [`Action`].
#[derive(Debug, Default)]
pub struct Batches(Vec<Batch>);

impl Batches {
    pub fn push(&mut self, action: Action, record: Record) {
        match self.0.iter_mut().find(|batch| batch.action == action) {
            Some(batch) => batch.records.push(record),
            None => self.0.push(Batch {
                action,
                records: vec![record],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Move the [`Batch`] for the provided [`Action`] to the front, if present.
    pub fn prioritise(&mut self, action: Action) {
        if let Some(index) = self.0.iter().position(|batch| batch.action == action) {
            let batch = self.0.remove(index);
            self.0.insert(0, batch);
        }
    }

    pub fn into_vec(self) -> Vec<Batch> {
        self.0
            .into_iter()
            .filter(|batch| !batch.records.is_empty())
            .collect()
    }
}
