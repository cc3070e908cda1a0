use super::{Context, Keyed, Serializer, is_positive};
use crate::{
    error::DataError,
    event::{Action, Record, Side, Table},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Normalised public trade.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PublicTrade {
    pub symbol: SmolStr,
    pub id: SmolStr,
    pub price: f64,
    pub volume: f64,
    /// Aggressor side, if the exchange communicates it.
    pub side: Option<Side>,
    pub time: DateTime<Utc>,
}

impl Keyed for PublicTrade {
    fn symbol(&self) -> Option<&str> {
        Some(&self.symbol)
    }
}

/// Trades are immutable facts, so every record is an [`Action::Insert`].
#[derive(Debug, Default)]
pub struct TradeSerializer;

impl Serializer for TradeSerializer {
    type Item = PublicTrade;
    const TABLE: Table = Table::Trade;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        is_positive(item.price) && is_positive(item.volume)
    }

    fn load(
        &mut self,
        _: &Context<'_>,
        _: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        Ok(Some((Action::Insert, Record::Trade(item))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::test_utils::{Harness, shape, time};

    fn trade(price: f64, volume: f64) -> PublicTrade {
        PublicTrade {
            symbol: SmolStr::new("XBTUSD"),
            id: SmolStr::new("31e50cb7-e005-a44e-f354-86e88dff52eb"),
            price,
            volume,
            side: Some(Side::Sell),
            time: time(0),
        }
    }

    #[test]
    fn test_trade_serializer() {
        struct TestCase {
            input: Vec<PublicTrade>,
            expected: Vec<(Action, usize)>,
        }

        let tests = vec![
            TestCase {
                // TC0: valid trades are inserted regardless of message action
                input: vec![trade(24564.5, 200.0), trade(24565.0, 100.0)],
                expected: vec![(Action::Insert, 2)],
            },
            TestCase {
                // TC1: zero volume trade skipped
                input: vec![trade(24564.5, 0.0), trade(24565.0, 100.0)],
                expected: vec![(Action::Insert, 1)],
            },
            TestCase {
                // TC2: nothing valid produces nothing
                input: vec![trade(f64::NAN, 1.0)],
                expected: vec![],
            },
        ];

        let harness = Harness::bitmex();
        for (index, test) in tests.into_iter().enumerate() {
            let actual = TradeSerializer
                .get_data(&harness.context(), Action::Partial, test.input)
                .unwrap();
            assert_eq!(shape(&actual), test.expected, "TC{} failed", index);
        }
    }
}
