use crate::exchange::{ExchangeId, Schema};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Debug;

/// Read interface to the last known normalised state of every symbol, used to backfill fields
/// the exchange omits in incremental push messages.
///
/// Shared read-only across connections. Writes belong to the REST layer that populates it.
pub trait StateStore
where
    Self: Debug + Send + Sync,
{
    /// Fetch the [`Snapshot`] of the symbol. Absent is an expected outcome for unknown symbols.
    fn get_snapshot(&self, exchange: ExchangeId, schema: Schema, symbol: &str)
    -> Option<Snapshot>;
}

/// Last known full normalised state of a symbol.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Snapshot {
    pub symbol: SmolStr,
    pub system_symbol: SmolStr,
    pub schema: Schema,
    pub pair: SmolStr,
    pub tick: f64,
    pub volume_tick: f64,
    pub max_leverage: Option<f64>,
    pub price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub mark_price: Option<f64>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub extra: SnapshotExtra,
}

/// [`Schema`] specific [`Snapshot`] fields.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SnapshotExtra {
    #[serde(default)]
    pub leverage_brackets: Vec<LeverageBracket>,
    pub contract_size: Option<f64>,
    pub wallet_asset: Option<SmolStr>,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct LeverageBracket {
    pub notional_cap: f64,
    pub max_leverage: f64,
}

/// [`StateStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    snapshots: RwLock<FnvHashMap<(ExchangeId, Schema, SmolStr), Snapshot>>,
}

impl InMemoryStateStore {
    /// Insert (or replace) the [`Snapshot`] of a symbol.
    pub fn insert(&self, exchange: ExchangeId, snapshot: Snapshot) {
        self.snapshots.write().insert(
            (exchange, snapshot.schema, snapshot.symbol.clone()),
            snapshot,
        );
    }

    pub fn with_snapshots<Iter>(self, exchange: ExchangeId, snapshots: Iter) -> Self
    where
        Iter: IntoIterator<Item = Snapshot>,
    {
        snapshots
            .into_iter()
            .for_each(|snapshot| self.insert(exchange, snapshot));
        self
    }
}

impl StateStore for InMemoryStateStore {
    fn get_snapshot(
        &self,
        exchange: ExchangeId,
        schema: Schema,
        symbol: &str,
    ) -> Option<Snapshot> {
        self.snapshots
            .read()
            .get(&(exchange, schema, SmolStr::new(symbol)))
            .cloned()
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    pub fn snapshot(symbol: &str, schema: Schema) -> Snapshot {
        Snapshot {
            symbol: SmolStr::new(symbol),
            system_symbol: SmolStr::new(symbol.to_lowercase()),
            schema,
            pair: SmolStr::new("XBT-USD"),
            tick: 0.5,
            volume_tick: 1.0,
            max_leverage: Some(100.0),
            price: None,
            bid_price: None,
            ask_price: None,
            mark_price: None,
            created: DateTime::<Utc>::MIN_UTC,
            extra: SnapshotExtra {
                leverage_brackets: vec![],
                contract_size: Some(1.0),
                wallet_asset: Some(SmolStr::new("XBT")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_state_store_get_snapshot() {
        struct TestCase {
            exchange: ExchangeId,
            schema: Schema,
            symbol: &'static str,
            expected: bool,
        }

        let store = InMemoryStateStore::default().with_snapshots(
            ExchangeId::Bitmex,
            [test_utils::snapshot("XBTUSD", Schema::Margin)],
        );

        let tests = vec![
            TestCase {
                // TC0: known symbol
                exchange: ExchangeId::Bitmex,
                schema: Schema::Margin,
                symbol: "XBTUSD",
                expected: true,
            },
            TestCase {
                // TC1: unknown symbol is absent, not an error
                exchange: ExchangeId::Bitmex,
                schema: Schema::Margin,
                symbol: "ETHUSD",
                expected: false,
            },
            TestCase {
                // TC2: same symbol under another schema
                exchange: ExchangeId::Bitmex,
                schema: Schema::Exchange,
                symbol: "XBTUSD",
                expected: false,
            },
            TestCase {
                // TC3: same symbol under another exchange
                exchange: ExchangeId::Binance,
                schema: Schema::Margin,
                symbol: "XBTUSD",
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = store
                .get_snapshot(test.exchange, test.schema, test.symbol)
                .is_some();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
