use super::{Context, Keyed, Serializer, is_positive};
use crate::{
    error::DataError,
    event::{Action, Batch, Batches, Record, Side, Table},
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::trace;

/// Price level delta pushed by the exchange. Zero or absent volume removes the level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelUpdate {
    pub symbol: SmolStr,
    pub side: Side,
    pub price: f64,
    pub volume: Option<f64>,
}

impl Keyed for LevelUpdate {
    fn symbol(&self) -> Option<&str> {
        Some(&self.symbol)
    }
}

/// Normalised order book level.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Level {
    pub symbol: SmolStr,
    /// Stable identifier derived from the price & [`Side`], see [`level_id`].
    pub id: u64,
    pub side: Side,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Stable level identifier: the price in hundredths, followed by one digit for the [`Side`].
///
/// Identical `(price, side)` pairs always map to the same id, so a consumer can key a book
/// by id alone.
pub fn level_id(price: f64, side: Side) -> u64 {
    (price * 100.0).round() as u64 * 10 + side.ordinal()
}

/// Converts level deltas into level records. Deletions are always emitted before the insert
/// or update batch of the same message, so a consumer never briefly holds two levels at one
/// price.
#[derive(Debug, Default)]
pub struct OrderBookSerializer;

impl Serializer for OrderBookSerializer {
    type Item = LevelUpdate;
    const TABLE: Table = Table::OrderBook;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        is_positive(item.price)
    }

    fn load(
        &mut self,
        _: &Context<'_>,
        action: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        let removed = item.volume.is_none_or(|volume| volume <= 0.0);

        let action = match (action, removed) {
            // A snapshot has nothing to remove
            (Action::Partial, true) => return Ok(None),
            (_, true) => Action::Delete,
            (action, false) => action,
        };

        Ok(Some((
            action,
            Record::OrderBook(Level {
                symbol: item.symbol,
                id: level_id(item.price, item.side),
                side: item.side,
                price: item.price,
                volume: item.volume.filter(|_| action != Action::Delete),
            }),
        )))
    }

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

        batches.prioritise(Action::Delete);
        Ok(batches.into_vec())
    }
}
