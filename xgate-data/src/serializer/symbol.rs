use super::{Context, EnrichmentMiss, Keyed, Serializer, merge_field};
use crate::{
    error::DataError,
    event::{Action, Record, Table},
    exchange::Schema,
    store::Snapshot,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::trace;

/// Partial ticker fields pushed by the exchange. Absent fields are unknown, not cleared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymbolUpdate {
    pub symbol: SmolStr,
    pub price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub mark_price: Option<f64>,
    pub index_price: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub volume_quote: Option<f64>,
    pub open_interest: Option<f64>,
    pub funding_rate: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl Keyed for SymbolUpdate {
    fn symbol(&self) -> Option<&str> {
        Some(&self.symbol)
    }
}

/// Normalised symbol record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SymbolRecord {
    pub symbol: SmolStr,
    pub system_symbol: Option<SmolStr>,
    pub schema: Schema,
    pub pair: Option<SmolStr>,
    pub tick: Option<f64>,
    pub volume_tick: Option<f64>,
    pub max_leverage: Option<f64>,
    pub price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub mark_price: Option<f64>,
    pub index_price: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub volume_quote: Option<f64>,
    pub open_interest: Option<f64>,
    pub funding_rate: Option<f64>,
    pub time: DateTime<Utc>,
}

impl SymbolRecord {
    fn new(symbol: SmolStr, schema: Schema, time: DateTime<Utc>) -> Self {
        Self {
            symbol,
            system_symbol: None,
            schema,
            pair: None,
            tick: None,
            volume_tick: None,
            max_leverage: None,
            price: None,
            bid_price: None,
            ask_price: None,
            mark_price: None,
            index_price: None,
            open: None,
            high: None,
            low: None,
            volume: None,
            volume_quote: None,
            open_interest: None,
            funding_rate: None,
            time,
        }
    }

    /// Refresh static fields from the [`Snapshot`], and backfill prices still unknown.
    fn enrich(&mut self, snapshot: &Snapshot) {
        self.system_symbol = Some(snapshot.system_symbol.clone());
        self.pair = Some(snapshot.pair.clone());
        self.tick = Some(snapshot.tick);
        self.volume_tick = Some(snapshot.volume_tick);
        merge_field(&mut self.max_leverage, snapshot.max_leverage);

        self.price = self.price.or(snapshot.price);
        self.bid_price = self.bid_price.or(snapshot.bid_price);
        self.ask_price = self.ask_price.or(snapshot.ask_price);
        self.mark_price = self.mark_price.or(snapshot.mark_price);
    }

    fn merge(&mut self, update: SymbolUpdate, time: DateTime<Utc>) {
        merge_field(&mut self.price, update.price);
        merge_field(&mut self.bid_price, update.bid_price);
        merge_field(&mut self.ask_price, update.ask_price);
        merge_field(&mut self.mark_price, update.mark_price);
        merge_field(&mut self.index_price, update.index_price);
        merge_field(&mut self.open, update.open);
        merge_field(&mut self.high, update.high);
        merge_field(&mut self.low, update.low);
        merge_field(&mut self.volume, update.volume);
        merge_field(&mut self.volume_quote, update.volume_quote);
        merge_field(&mut self.open_interest, update.open_interest);
        merge_field(&mut self.funding_rate, update.funding_rate);
        self.time = update.time.unwrap_or(time);
    }
}

/// Merges partial ticker pushes onto previously known per-symbol fields, so every emitted
/// record is complete. Always emits [`Action::Update`].
#[derive(Debug, Default)]
pub struct SymbolSerializer {
    cache: FnvHashMap<SmolStr, SymbolRecord>,
}

impl Serializer for SymbolSerializer {
    type Item = SymbolUpdate;
    const TABLE: Table = Table::Symbol;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        !item.symbol.is_empty()
    }

    fn load(
        &mut self,
        context: &Context<'_>,
        _: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        let snapshot = match context.snapshot(&item.symbol) {
            Ok(snapshot) => snapshot,
            Err(EnrichmentMiss) => {
                trace!(symbol = %item.symbol, "skipping symbol absent from state store");
                return Ok(None);
            }
        };

        let record = self.cache.entry(item.symbol.clone()).or_insert_with(|| {
            SymbolRecord::new(item.symbol.clone(), context.schema, context.time)
        });

        if let Some(snapshot) = &snapshot {
            record.enrich(snapshot);
        }
        record.merge(item, context.time);

        Ok(Some((Action::Update, Record::Symbol(record.clone()))))
    }
}
