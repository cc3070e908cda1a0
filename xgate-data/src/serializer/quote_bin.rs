use super::{Context, Keyed, Serializer, is_positive};
use crate::{
    error::DataError,
    event::{Action, Batch, Batches, Record, Table},
};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::trace;

/// Width of one bar.
pub const BIN_SIZE: TimeDelta = TimeDelta::minutes(1);

/// Input feeding the bar of a symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteBinUpdate {
    /// Single trade extending the open bar.
    Tick {
        symbol: SmolStr,
        time: DateTime<Utc>,
        price: f64,
        volume: f64,
    },
    /// Exchange computed bar, with `closed` set once the bar is final.
    Bar { bin: QuoteBin, closed: bool },
}

impl Keyed for QuoteBinUpdate {
    fn symbol(&self) -> Option<&str> {
        match self {
            QuoteBinUpdate::Tick { symbol, .. } => Some(symbol),
            QuoteBinUpdate::Bar { bin, .. } => Some(&bin.symbol),
        }
    }
}

/// One OHLCV bar. `time` is the start of the bar.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QuoteBin {
    pub symbol: SmolStr,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl QuoteBin {
    fn from_tick(symbol: SmolStr, time: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self {
            symbol,
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    fn extend(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }
}

/// Start of the bar containing `time`.
pub fn bin_start(time: DateTime<Utc>) -> DateTime<Utc> {
    time.duration_trunc(BIN_SIZE).unwrap_or(time)
}

#[derive(Debug, Default)]
struct BinState {
    bar: Option<QuoteBin>,
    /// Start of the oldest bar still accepted. Anything older was either never tracked, or
    /// already closed.
    initialized: Option<DateTime<Utc>>,
}

impl BinState {
    fn is_stale(&self, time: DateTime<Utc>) -> bool {
        self.initialized.is_some_and(|initialized| time < initialized)
    }

    fn tick(
        &mut self,
        symbol: SmolStr,
        time: DateTime<Utc>,
        price: f64,
        volume: f64,
    ) -> Option<(Action, QuoteBin)> {
        let start = bin_start(time);
        if self.is_stale(start) {
            return None;
        }

        let action = match &mut self.bar {
            Some(bar) if start == bar.time => {
                bar.extend(price, volume);
                Action::Update
            }
            Some(bar) if start < bar.time => return None,
            _ => {
                self.bar = Some(QuoteBin::from_tick(symbol, start, price, volume));
                self.initialized.get_or_insert(start);
                Action::Insert
            }
        };

        self.bar.clone().map(|bar| (action, bar))
    }

    fn bar(&mut self, bin: QuoteBin, closed: bool) -> Option<(Action, QuoteBin)> {
        if self.is_stale(bin.time) {
            return None;
        }

        let tracked = self.bar.as_ref().map(|bar| bar.time);

        if closed {
            let action = match tracked {
                Some(time) if bin.time <= time => Action::Update,
                _ => Action::Insert,
            };

            // Closed bar resets tracking: the next tick starts a fresh bar
            if tracked.is_none_or(|time| time <= bin.time) {
                self.bar = None;
            }
            let next = bin.time + BIN_SIZE;
            self.initialized = Some(self.initialized.map_or(next, |init| init.max(next)));

            return Some((action, bin));
        }

        let action = match tracked {
            Some(time) if bin.time == time => Action::Update,
            Some(time) if bin.time < time => return None,
            _ => Action::Insert,
        };

        self.initialized.get_or_insert(bin.time);
        self.bar = Some(bin.clone());
        Some((action, bin))
    }
}

/// Aggregates trade ticks and exchange bars into per-symbol one minute bars.
///
/// A tick in a later minute than the tracked bar starts a new bar ([`Action::Insert`]), a tick
/// in the same minute extends it ([`Action::Update`]), and older ticks are discarded. Bars older
/// than the tracked `initialized` time are discarded, which guards against out-of-order
/// delivery after a reconnect.
#[derive(Debug, Default)]
pub struct QuoteBinSerializer {
    bins: FnvHashMap<SmolStr, BinState>,
}

impl Serializer for QuoteBinSerializer {
    type Item = QuoteBinUpdate;
    const TABLE: Table = Table::QuoteBin;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        match item {
            QuoteBinUpdate::Tick { price, volume, .. } => {
                is_positive(*price) && volume.is_finite() && *volume >= 0.0
            }
            QuoteBinUpdate::Bar { bin, .. } => {
                [bin.open, bin.high, bin.low, bin.close]
                    .into_iter()
                    .all(is_positive)
                    && bin.volume >= 0.0
            }
        }
    }

    fn load(
        &mut self,
        _: &Context<'_>,
        _: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        let loaded = match item {
            QuoteBinUpdate::Tick {
                symbol,
                time,
                price,
                volume,
            } => self
                .bins
                .entry(symbol.clone())
                .or_default()
                .tick(symbol, time, price, volume),
            QuoteBinUpdate::Bar { bin, closed } => self
                .bins
                .entry(bin.symbol.clone())
                .or_default()
                .bar(bin, closed),
        };

        if loaded.is_none() {
            trace!("discarding out-of-order quote bin input");
        }

        Ok(loaded.map(|(action, bin)| (action, Record::QuoteBin(bin))))
    }

    /// Emits at most one record per `(symbol, bar)` for a message, holding the latest bar
    /// state. The record is an [`Action::Insert`] if the bar was created by this message.
    fn get_data(
        &mut self,
        context: &Context<'_>,
        action: Action,
        items: Vec<Self::Item>,
    ) -> Result<Vec<Batch>, DataError> {
        let mut latest: Vec<(Action, QuoteBin)> = Vec::new();

        for item in items {
            if !self.is_item_valid(context, &item) {
                trace!(table = %Self::TABLE, "skipping invalid item");
                continue;
            }

            let Some((action, Record::QuoteBin(bin))) = self.load(context, action, item)? else {
                continue;
            };

            match latest
                .iter_mut()
                .find(|(_, seen)| seen.symbol == bin.symbol && seen.time == bin.time)
            {
                Some((seen_action, seen)) => {
                    if *seen_action != Action::Insert {
                        *seen_action = action;
                    }
                    *seen = bin;
                }
                None => latest.push((action, bin)),
            }
        }

        let mut batches = Batches::default();
        latest
            .into_iter()
            .for_each(|(action, bin)| batches.push(action, Record::QuoteBin(bin)));

        Ok(batches.into_vec())
    }
}
