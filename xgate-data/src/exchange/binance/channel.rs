use crate::{
    error::DataError,
    event::Table,
    exchange::{ExchangeChannel, ExchangeId, Schema},
    registry::SymbolKey,
};
use serde::Serialize;
use smol_str::format_smolstr;

/// Binance market stream suffix (or whole name, for all-market streams).
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#websocket-market-streams>
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#websocket-market-streams>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct BinanceChannel(pub &'static str);

impl BinanceChannel {
    /// Rolling 24hr ticker.
    pub const TICKER: Self = Self("@ticker");

    /// Rolling 24hr ticker of every market.
    pub const TICKER_ALL: Self = Self("!ticker@arr");

    /// Futures mark price & funding rate.
    pub const MARK_PRICE: Self = Self("@markPrice");

    /// Futures mark price & funding rate of every market.
    pub const MARK_PRICE_ALL: Self = Self("!markPrice@arr");

    /// Aggregated public trades.
    pub const AGG_TRADES: Self = Self("@aggTrade");

    /// One minute candlesticks.
    pub const KLINE_1M: Self = Self("@kline_1m");

    /// OrderBook Level2 channel name (100ms delta updates).
    ///
    /// See docs: <https://binance-docs.github.io/apidocs/spot/en/#diff-depth-stream>
    pub const ORDER_BOOK_L2: Self = Self("@depth@100ms");

    /// Market stream of the symbol, eg/ `btcusdt@aggTrade`.
    ///
    /// Symbols must be lowercase when subscribing, but Binance sends messages with the
    /// uppercase symbol (eg/ BTCUSDT).
    pub fn stream(&self, symbol: &str) -> ExchangeChannel {
        ExchangeChannel(format_smolstr!("{}{}", symbol.to_lowercase(), self.0))
    }

    pub fn all(&self) -> ExchangeChannel {
        ExchangeChannel(self.0.into())
    }
}

/// Binance streams carrying the `(Table, SymbolKey)` pair for the [`Schema`].
///
/// Account tables arrive over the listen key stream and need no command.
pub fn channels(
    schema: Schema,
    table: Table,
    key: &SymbolKey,
) -> Result<Vec<ExchangeChannel>, DataError> {
    use BinanceChannel as Channel;

    let unsupported = || DataError::Unsupported {
        exchange: ExchangeId::Binance,
        schema,
        table,
    };

    let pick = |stream: Channel, all: Option<Channel>| match key.as_symbol() {
        Some(symbol) => Ok(stream.stream(symbol)),
        None => all.map(|all| all.all()).ok_or_else(unsupported),
    };

    let channels = match table {
        Table::Symbol if schema.is_futures() => vec![
            pick(Channel::TICKER, Some(Channel::TICKER_ALL))?,
            pick(Channel::MARK_PRICE, Some(Channel::MARK_PRICE_ALL))?,
        ],
        Table::Symbol => vec![pick(Channel::TICKER, Some(Channel::TICKER_ALL))?],
        Table::Trade => vec![pick(Channel::AGG_TRADES, None)?],
        Table::QuoteBin => vec![pick(Channel::KLINE_1M, None)?],
        Table::OrderBook => vec![pick(Channel::ORDER_BOOK_L2, None)?],
        Table::Position => match schema {
            Schema::MarginCross | Schema::MarginIsolated => {
                vec![pick(Channel::TICKER, Some(Channel::TICKER_ALL))?]
            }
            Schema::Margin | Schema::MarginCoin => {
                vec![pick(Channel::MARK_PRICE, Some(Channel::MARK_PRICE_ALL))?]
            }
            Schema::Exchange => return Err(unsupported()),
        },
        Table::Order | Table::Wallet | Table::WalletExtra => vec![],
    };

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol_str::SmolStr;

    #[test]
    fn test_binance_channels() {
        struct TestCase {
            schema: Schema,
            table: Table,
            key: SymbolKey,
            expected: Result<Vec<&'static str>, DataError>,
        }

        let btc = || SymbolKey::Symbol(SmolStr::new("BTCUSDT"));

        let tests = vec![
            TestCase {
                // TC0: spot order book
                schema: Schema::Exchange,
                table: Table::OrderBook,
                key: btc(),
                expected: Ok(vec!["btcusdt@depth@100ms"]),
            },
            TestCase {
                // TC1: futures symbol needs ticker & mark price
                schema: Schema::Margin,
                table: Table::Symbol,
                key: btc(),
                expected: Ok(vec!["btcusdt@ticker", "btcusdt@markPrice"]),
            },
            TestCase {
                // TC2: wildcard symbol
                schema: Schema::Exchange,
                table: Table::Symbol,
                key: SymbolKey::All,
                expected: Ok(vec!["!ticker@arr"]),
            },
            TestCase {
                // TC3: wildcard trades unsupported
                schema: Schema::Exchange,
                table: Table::Trade,
                key: SymbolKey::All,
                expected: Err(DataError::Unsupported {
                    exchange: ExchangeId::Binance,
                    schema: Schema::Exchange,
                    table: Table::Trade,
                }),
            },
            TestCase {
                // TC4: coin futures positions valued by mark price
                schema: Schema::MarginCoin,
                table: Table::Position,
                key: SymbolKey::All,
                expected: Ok(vec!["!markPrice@arr"]),
            },
            TestCase {
                // TC5: account table rides the listen key stream
                schema: Schema::Margin,
                table: Table::Order,
                key: btc(),
                expected: Ok(vec![]),
            },
            TestCase {
                // TC6: spot has no positions
                schema: Schema::Exchange,
                table: Table::Position,
                key: btc(),
                expected: Err(DataError::Unsupported {
                    exchange: ExchangeId::Binance,
                    schema: Schema::Exchange,
                    table: Table::Position,
                }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = channels(test.schema, test.table, &test.key).map(|channels| {
                channels
                    .into_iter()
                    .map(|channel| channel.0.to_string())
                    .collect::<Vec<_>>()
            });
            let expected = test.expected.map(|channels| {
                channels
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            });
            assert_eq!(actual, expected, "TC{} failed", index);
        }
    }
}
