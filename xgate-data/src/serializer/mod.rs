use crate::{
    error::DataError,
    event::{Action, Batch, Batches, Record, Table},
    exchange::{ExchangeId, Schema},
    rates::ExchangeRates,
    store::{Snapshot, StateStore},
};
use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use tokio::sync::watch;
use tracing::trace;

/// Symbol ticker [`Serializer`] merging partial pushes onto cached per-symbol state.
pub mod symbol;

/// Public trade [`Serializer`].
pub mod trade;

/// One minute OHLCV bar [`Serializer`].
pub mod quote_bin;

/// Order book level delta [`Serializer`].
pub mod order_book;

/// Account order [`Serializer`] deriving the action from the order status.
pub mod order;

/// Account position [`Serializer`].
pub mod position;

/// Account balance & portfolio total [`Serializer`]s.
pub mod wallet;

/// Everything a [`Serializer`] may consult while loading items of one message.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub exchange: ExchangeId,
    pub schema: Schema,
    pub account: &'a SmolStr,
    pub store: &'a dyn StateStore,
    /// Strict enrichment: skip items whose symbol has no [`Snapshot`].
    pub register_state: bool,
    pub rates: &'a watch::Receiver<ExchangeRates>,
    /// Time the message was received, used when the exchange omits a timestamp.
    pub time: DateTime<Utc>,
}

/// Symbol absent from the [`StateStore`] while strict enrichment is enabled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EnrichmentMiss;

impl Context<'_> {
    /// Fetch the [`Snapshot`] used to enrich an item of the symbol.
    ///
    /// A missing snapshot is an [`EnrichmentMiss`] in strict mode and `Ok(None)` otherwise.
    pub fn snapshot(&self, symbol: &str) -> Result<Option<Snapshot>, EnrichmentMiss> {
        match self.store.get_snapshot(self.exchange, self.schema, symbol) {
            Some(snapshot) => Ok(Some(snapshot)),
            None if self.register_state => Err(EnrichmentMiss),
            None => Ok(None),
        }
    }
}

/// Incremental state machine converting normalised exchange items of one [`Table`] into
/// records.
pub trait Serializer {
    /// Exchange independent item extracted from a raw message.
    type Item;

    const TABLE: Table;

    /// Determines if the item can be loaded. Invalid items are skipped silently.
    fn is_item_valid(&self, _: &Context<'_>, _: &Self::Item) -> bool {
        true
    }

    /// Load one item, merging it with working state, into an `(Action, Record)` pair.
    ///
    /// `Ok(None)` skips the item without producing output.
    fn load(
        &mut self,
        context: &Context<'_>,
        action: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError>;

    /// Load every item of a message, grouping the records into [`Batch`]es by [`Action`].
    fn get_data(
        &mut self,
        context: &Context<'_>,
        action: Action,
        items: Vec<Self::Item>,
    ) -> Result<Vec<Batch>, DataError> {
        let mut batches = Batches::default();

        for item in items {
            if !self.is_item_valid(context, &item) {
                trace!(table = %Self::TABLE, "skipping invalid item");
                continue;
            }

            if let Some((action, record)) = self.load(context, action, item)? {
                batches.push(action, record);
            }
        }

        Ok(batches.into_vec())
    }
}

/// Normalised items extracted for one [`Table`] branch of an exchange message.
#[derive(Debug, Clone, PartialEq)]
pub enum Updates {
    Symbol(Vec<symbol::SymbolUpdate>),
    Trade(Vec<trade::PublicTrade>),
    QuoteBin(Vec<quote_bin::QuoteBinUpdate>),
    OrderBook(Vec<order_book::LevelUpdate>),
    Order(Vec<order::OrderUpdate>),
    Position(Vec<position::PositionUpdate>),
    Wallet(Vec<wallet::BalanceUpdate>),
    WalletExtra(Vec<wallet::BalanceUpdate>),
}

/// Item keyed by an exchange symbol.
pub trait Keyed {
    /// Exchange symbol of the item, `None` for account wide items.
    fn symbol(&self) -> Option<&str>;
}

impl Updates {
    pub fn table(&self) -> Table {
        match self {
            Updates::Symbol(_) => Table::Symbol,
            Updates::Trade(_) => Table::Trade,
            Updates::QuoteBin(_) => Table::QuoteBin,
            Updates::OrderBook(_) => Table::OrderBook,
            Updates::Order(_) => Table::Order,
            Updates::Position(_) => Table::Position,
            Updates::Wallet(_) => Table::Wallet,
            Updates::WalletExtra(_) => Table::WalletExtra,
        }
    }

    /// Retain only items whose symbol satisfies the predicate. Account wide items are kept.
    pub fn retain<FnKeep>(&mut self, keep: FnKeep)
    where
        FnKeep: Fn(&str) -> bool,
    {
        fn retain_keyed<T: Keyed>(items: &mut Vec<T>, keep: impl Fn(&str) -> bool) {
            items.retain(|item| item.symbol().is_none_or(&keep))
        }

        match self {
            Updates::Symbol(items) => retain_keyed(items, keep),
            Updates::Trade(items) => retain_keyed(items, keep),
            Updates::QuoteBin(items) => retain_keyed(items, keep),
            Updates::OrderBook(items) => retain_keyed(items, keep),
            Updates::Order(items) => retain_keyed(items, keep),
            Updates::Position(items) => retain_keyed(items, keep),
            Updates::Wallet(items) | Updates::WalletExtra(items) => retain_keyed(items, keep),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Updates::Symbol(items) => items.is_empty(),
            Updates::Trade(items) => items.is_empty(),
            Updates::QuoteBin(items) => items.is_empty(),
            Updates::OrderBook(items) => items.is_empty(),
            Updates::Order(items) => items.is_empty(),
            Updates::Position(items) => items.is_empty(),
            Updates::Wallet(items) | Updates::WalletExtra(items) => items.is_empty(),
        }
    }
}

/// One instance of every [`Serializer`], owned by a single
/// [`Router`](crate::router::Router) and reused across all messages of its connection.
#[derive(Debug, Default)]
pub struct Serializers {
    pub symbol: symbol::SymbolSerializer,
    pub trade: trade::TradeSerializer,
    pub quote_bin: quote_bin::QuoteBinSerializer,
    pub order_book: order_book::OrderBookSerializer,
    pub order: order::OrderSerializer,
    pub position: position::PositionSerializer,
    pub wallet: wallet::WalletSerializer,
    pub wallet_extra: wallet::WalletExtraSerializer,
}

impl Serializers {
    /// Dispatch the [`Updates`] to the [`Serializer`] of their [`Table`].
    pub fn get_data(
        &mut self,
        context: &Context<'_>,
        action: Action,
        updates: Updates,
    ) -> Result<Vec<Batch>, DataError> {
        match updates {
            Updates::Symbol(items) => self.symbol.get_data(context, action, items),
            Updates::Trade(items) => self.trade.get_data(context, action, items),
            Updates::QuoteBin(items) => self.quote_bin.get_data(context, action, items),
            Updates::OrderBook(items) => self.order_book.get_data(context, action, items),
            Updates::Order(items) => self.order.get_data(context, action, items),
            Updates::Position(items) => self.position.get_data(context, action, items),
            Updates::Wallet(items) => self.wallet.get_data(context, action, items),
            Updates::WalletExtra(items) => self.wallet_extra.get_data(context, action, items),
        }
    }
}

/// Overwrite `target` only if the incoming `value` is known.
pub(crate) fn merge_field<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

/// Determines if a value is a usable price or quantity.
pub(crate) fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::store::{InMemoryStateStore, test_utils::snapshot};

    /// Owns everything a [`Context`] borrows.
    #[derive(Debug)]
    pub struct Harness {
        pub exchange: ExchangeId,
        pub schema: Schema,
        pub account: SmolStr,
        pub store: InMemoryStateStore,
        pub register_state: bool,
        pub rates: watch::Receiver<ExchangeRates>,
        pub time: DateTime<Utc>,
    }

    impl Harness {
        pub fn bitmex() -> Self {
            Self {
                exchange: ExchangeId::Bitmex,
                schema: Schema::Margin,
                account: SmolStr::new("account"),
                store: InMemoryStateStore::default()
                    .with_snapshots(ExchangeId::Bitmex, [snapshot("XBTUSD", Schema::Margin)]),
                register_state: true,
                rates: watch::channel(ExchangeRates::default()).1,
                time: time(0),
            }
        }

        pub fn with_rates(self, rates: ExchangeRates) -> Self {
            Self {
                rates: watch::channel(rates).1,
                ..self
            }
        }

        pub fn permissive(self) -> Self {
            Self {
                register_state: false,
                ..self
            }
        }

        pub fn context(&self) -> Context<'_> {
            Context {
                exchange: self.exchange,
                schema: self.schema,
                account: &self.account,
                store: &self.store,
                register_state: self.register_state,
                rates: &self.rates,
                time: self.time,
            }
        }
    }

    /// Fixed test time offset by `secs` seconds.
    pub fn time(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_676_712_420 + secs, 0).unwrap_or_default()
    }

    /// Flatten [`Batch`]es into `(Action, record count)` pairs.
    pub fn shape(batches: &[Batch]) -> Vec<(Action, usize)> {
        batches
            .iter()
            .map(|batch| (batch.action, batch.records.len()))
            .collect()
    }
}
