use super::{Context, EnrichmentMiss, Keyed, Serializer, merge_field};
use crate::{
    error::DataError,
    event::{Action, Record, Side, Table},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::trace;

/// Partial position fields pushed by the exchange.
///
/// `mark_only` updates come from public mark price streams and only refresh positions that
/// are already open.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionUpdate {
    pub symbol: SmolStr,
    /// Signed size, negative for short positions.
    pub size: Option<f64>,
    pub entry_price: Option<f64>,
    pub leverage: Option<f64>,
    pub liquidation_price: Option<f64>,
    pub mark_price: Option<f64>,
    pub unrealised_pnl: Option<f64>,
    pub cross: Option<bool>,
    pub time: Option<DateTime<Utc>>,
    pub mark_only: bool,
}

impl Keyed for PositionUpdate {
    fn symbol(&self) -> Option<&str> {
        Some(&self.symbol)
    }
}

/// Normalised account position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub account: SmolStr,
    pub symbol: SmolStr,
    pub system_symbol: Option<SmolStr>,
    pub size: f64,
    pub side: Side,
    pub entry_price: Option<f64>,
    pub leverage: Option<f64>,
    pub liquidation_price: Option<f64>,
    pub mark_price: Option<f64>,
    pub unrealised_pnl: Option<f64>,
    pub cross: Option<bool>,
    pub contract_size: Option<f64>,
    pub time: DateTime<Utc>,
}

impl Position {
    fn merge(&mut self, update: PositionUpdate, time: DateTime<Utc>) {
        if let Some(size) = update.size {
            self.size = size;
            self.side = side_of(size);
        }
        merge_field(&mut self.entry_price, update.entry_price);
        merge_field(&mut self.leverage, update.leverage);
        merge_field(&mut self.liquidation_price, update.liquidation_price);
        merge_field(&mut self.mark_price, update.mark_price);
        merge_field(&mut self.unrealised_pnl, update.unrealised_pnl);
        merge_field(&mut self.cross, update.cross);
        self.time = update.time.unwrap_or(time);
    }
}

fn side_of(size: f64) -> Side {
    if size < 0.0 { Side::Sell } else { Side::Buy }
}

/// Tracks open positions per `(account, symbol)`.
///
/// A position closing to zero size is emitted as [`Action::Delete`] and evicted. Positions are
/// enriched with the [`Snapshot`](crate::store::Snapshot) of their symbol, so strict mode
/// skips symbols unknown to the [`StateStore`](crate::store::StateStore).
#[derive(Debug, Default)]
pub struct PositionSerializer {
    positions: FnvHashMap<(SmolStr, SmolStr), Position>,
}

impl Serializer for PositionSerializer {
    type Item = PositionUpdate;
    const TABLE: Table = Table::Position;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        !item.symbol.is_empty() && item.size.is_none_or(f64::is_finite)
    }

    fn load(
        &mut self,
        context: &Context<'_>,
        action: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        let key = (context.account.clone(), item.symbol.clone());

        if item.mark_only {
            return Ok(self.positions.get_mut(&key).map(|position| {
                merge_field(&mut position.mark_price, item.mark_price);
                position.time = item.time.unwrap_or(context.time);
                (Action::Update, Record::Position(position.clone()))
            }));
        }

        let snapshot = match context.snapshot(&item.symbol) {
            Ok(snapshot) => snapshot,
            Err(EnrichmentMiss) => {
                trace!(symbol = %item.symbol, "skipping position absent from state store");
                return Ok(None);
            }
        };

        if action == Action::Delete {
            return Ok(self
                .positions
                .remove(&key)
                .map(|position| (Action::Delete, Record::Position(position))));
        }

        if let Some(position) = self.positions.get_mut(&key) {
            position.merge(item, context.time);

            if position.size == 0.0 {
                return Ok(self
                    .positions
                    .remove(&key)
                    .map(|position| (Action::Delete, Record::Position(position))));
            }

            let action = match action {
                Action::Partial => Action::Partial,
                _ => Action::Update,
            };
            return Ok(Some((action, Record::Position(position.clone()))));
        }

        let Some(size) = item.size.filter(|size| *size != 0.0) else {
            return Ok(None);
        };

        let mut position = Position {
            account: context.account.clone(),
            symbol: item.symbol.clone(),
            system_symbol: snapshot.as_ref().map(|snapshot| snapshot.system_symbol.clone()),
            size,
            side: side_of(size),
            entry_price: None,
            leverage: None,
            liquidation_price: None,
            mark_price: snapshot.as_ref().and_then(|snapshot| snapshot.mark_price),
            unrealised_pnl: None,
            cross: None,
            contract_size: snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.extra.contract_size),
            time: context.time,
        };
        position.merge(item, context.time);

        let action = match action {
            Action::Partial => Action::Partial,
            _ => Action::Insert,
        };
        self.positions.insert(key, position.clone());

        Ok(Some((action, Record::Position(position))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::test_utils::{Harness, shape};

    fn update(symbol: &str, size: Option<f64>) -> PositionUpdate {
        PositionUpdate {
            symbol: SmolStr::new(symbol),
            size,
            entry_price: Some(24_000.0),
            ..Default::default()
        }
    }

    fn mark(symbol: &str, mark_price: f64) -> PositionUpdate {
        PositionUpdate {
            symbol: SmolStr::new(symbol),
            mark_price: Some(mark_price),
            mark_only: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_position_lifecycle() {
        struct TestCase {
            action: Action,
            input: PositionUpdate,
            expected: Vec<(Action, usize)>,
        }

        let tests = vec![
            TestCase {
                // TC0: mark price for unknown position ignored
                action: Action::Update,
                input: mark("XBTUSD", 24_100.0),
                expected: vec![],
            },
            TestCase {
                // TC1: zero size for unknown position ignored
                action: Action::Update,
                input: update("XBTUSD", Some(0.0)),
                expected: vec![],
            },
            TestCase {
                // TC2: position opened
                action: Action::Insert,
                input: update("XBTUSD", Some(-100.0)),
                expected: vec![(Action::Insert, 1)],
            },
            TestCase {
                // TC3: mark price refreshes open position
                action: Action::Update,
                input: mark("XBTUSD", 24_100.0),
                expected: vec![(Action::Update, 1)],
            },
            TestCase {
                // TC4: partial of open position
                action: Action::Partial,
                input: update("XBTUSD", Some(-50.0)),
                expected: vec![(Action::Partial, 1)],
            },
            TestCase {
                // TC5: closed to zero
                action: Action::Update,
                input: update("XBTUSD", Some(0.0)),
                expected: vec![(Action::Delete, 1)],
            },
            TestCase {
                // TC6: delete of evicted position ignored
                action: Action::Delete,
                input: update("XBTUSD", None),
                expected: vec![],
            },
        ];

        let harness = Harness::bitmex();
        let mut serializer = PositionSerializer::default();
        for (index, test) in tests.into_iter().enumerate() {
            let actual = serializer
                .get_data(&harness.context(), test.action, vec![test.input])
                .unwrap();
            assert_eq!(shape(&actual), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_position_enrichment() {
        let harness = Harness::bitmex();
        let mut serializer = PositionSerializer::default();

        let actual = serializer
            .get_data(
                &harness.context(),
                Action::Insert,
                vec![update("XBTUSD", Some(-100.0)), update("ETHUSD", Some(10.0))],
            )
            .unwrap();

        // Strict mode skips the symbol unknown to the store
        assert_eq!(shape(&actual), vec![(Action::Insert, 1)]);
        match &actual[0].records[0] {
            Record::Position(position) => {
                assert_eq!(position.side, Side::Sell);
                assert_eq!(position.system_symbol.as_deref(), Some("xbtusd"));
                assert_eq!(position.contract_size, Some(1.0));
                assert_eq!(position.entry_price, Some(24_000.0));
            }
            other => panic!("expected position record, got: {other:?}"),
        }

        let mut serializer = PositionSerializer::default();
        let actual = serializer
            .get_data(
                &harness.permissive().context(),
                Action::Insert,
                vec![update("ETHUSD", Some(10.0))],
            )
            .unwrap();
        assert_eq!(shape(&actual), vec![(Action::Insert, 1)]);
    }

    #[test]
    fn test_mark_price_refresh_keeps_known_fields() {
        use crate::exchange::bitmex::instrument::BitmexInstrument;

        struct TestCase {
            input: PositionUpdate,
            expected_mark_price: Option<f64>,
        }

        let harness = Harness::bitmex();
        let context = harness.context();
        let mut serializer = PositionSerializer::default();

        let opened = PositionUpdate {
            leverage: Some(10.0),
            liquidation_price: Some(26_000.0),
            ..update("XBTUSD", Some(-100.0))
        };
        serializer
            .get_data(&context, Action::Insert, vec![opened])
            .unwrap();

        let instrument = serde_json::from_str::<BitmexInstrument>(
            r#"{"symbol": "XBTUSD", "markPrice": 24571.5, "timestamp": "2023-02-18T09:28:00.000Z"}"#,
        )
        .unwrap();

        let tests = vec![
            TestCase {
                // TC0: instrument push carrying only the mark price
                input: instrument.mark_update().unwrap(),
                expected_mark_price: Some(24_571.5),
            },
            TestCase {
                // TC1: position push carrying only the mark price
                input: PositionUpdate {
                    symbol: SmolStr::new("XBTUSD"),
                    mark_price: Some(24_600.0),
                    ..Default::default()
                },
                expected_mark_price: Some(24_600.0),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serializer
                .get_data(&context, Action::Update, vec![test.input])
                .unwrap();
            assert_eq!(shape(&actual), vec![(Action::Update, 1)], "TC{} failed", index);

            let Record::Position(position) = &actual[0].records[0] else {
                panic!("TC{index} failed: expected position record");
            };
            assert_eq!(position.mark_price, test.expected_mark_price, "TC{} failed", index);
            assert_eq!(position.entry_price, Some(24_000.0), "TC{} failed", index);
            assert_eq!(position.size, -100.0, "TC{} failed", index);
            assert_eq!(position.side, Side::Sell, "TC{} failed", index);
            assert_eq!(position.leverage, Some(10.0), "TC{} failed", index);
            assert_eq!(position.liquidation_price, Some(26_000.0), "TC{} failed", index);
        }
    }

    #[test]
    fn test_explicit_delete() {
        let harness = Harness::bitmex();
        let context = harness.context();
        let mut serializer = PositionSerializer::default();

        serializer
            .get_data(&context, Action::Insert, vec![update("XBTUSD", Some(5.0))])
            .unwrap();
        let actual = serializer
            .get_data(&context, Action::Delete, vec![update("XBTUSD", None)])
            .unwrap();

        assert_eq!(shape(&actual), vec![(Action::Delete, 1)]);
        assert!(serializer.positions.is_empty());
    }
}
