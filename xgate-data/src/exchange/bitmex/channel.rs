use crate::{event::Table, exchange::ExchangeChannel, registry::SymbolKey};
use serde::Serialize;
use smol_str::format_smolstr;

/// BitMEX realtime topic a normalised [`Table`] is fed from.
///
/// See docs: <https://www.bitmex.com/app/wsAPI#Subscriptions>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct BitmexChannel(pub &'static str);

impl BitmexChannel {
    pub const INSTRUMENT: Self = Self("instrument");
    pub const TRADE: Self = Self("trade");
    pub const TRADE_BIN_1M: Self = Self("tradeBin1m");
    pub const ORDER_BOOK_L2: Self = Self("orderBookL2");
    pub const ORDER_BOOK_L2_25: Self = Self("orderBookL2_25");
    pub const ORDER: Self = Self("order");
    pub const POSITION: Self = Self("position");
    pub const MARGIN: Self = Self("margin");

    /// Topics subscribed to in order to feed the [`Table`].
    pub fn topics(table: Table) -> &'static [Self] {
        match table {
            Table::Symbol => &[Self::INSTRUMENT],
            Table::Trade => &[Self::TRADE],
            Table::QuoteBin => &[Self::TRADE_BIN_1M, Self::TRADE],
            Table::OrderBook => &[Self::ORDER_BOOK_L2],
            Table::Order => &[Self::ORDER],
            Table::Position => &[Self::POSITION],
            Table::Wallet | Table::WalletExtra => &[Self::MARGIN],
        }
    }

    /// Account topics are streamed whole after authentication.
    pub fn is_account(&self) -> bool {
        matches!(*self, Self::ORDER | Self::POSITION | Self::MARGIN)
    }

    /// Exchange channel of the topic filtered by the [`SymbolKey`].
    ///
    /// eg/ `trade:XBTUSD`, or the bare `trade` for every symbol.
    pub fn channel(&self, key: &SymbolKey) -> ExchangeChannel {
        match key.as_symbol() {
            Some(symbol) if !self.is_account() => {
                ExchangeChannel(format_smolstr!("{}:{}", self.0, symbol.to_uppercase()))
            }
            _ => ExchangeChannel(self.0.into()),
        }
    }
}

impl AsRef<str> for BitmexChannel {
    fn as_ref(&self) -> &str {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol_str::SmolStr;

    #[test]
    fn test_bitmex_channel() {
        struct TestCase {
            table: Table,
            key: SymbolKey,
            expected: Vec<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: symbol filtered trades
                table: Table::Trade,
                key: SymbolKey::Symbol(SmolStr::new("xbtusd")),
                expected: vec!["trade:XBTUSD"],
            },
            TestCase {
                // TC1: quote bins fed by closed bins & ticks
                table: Table::QuoteBin,
                key: SymbolKey::Symbol(SmolStr::new("XBTUSD")),
                expected: vec!["tradeBin1m:XBTUSD", "trade:XBTUSD"],
            },
            TestCase {
                // TC2: wildcard
                table: Table::Symbol,
                key: SymbolKey::All,
                expected: vec!["instrument"],
            },
            TestCase {
                // TC3: account topic ignores symbol filter
                table: Table::Position,
                key: SymbolKey::Symbol(SmolStr::new("XBTUSD")),
                expected: vec!["position"],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = BitmexChannel::topics(test.table)
                .iter()
                .map(|topic| topic.channel(&test.key).0.to_string())
                .collect::<Vec<_>>();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
