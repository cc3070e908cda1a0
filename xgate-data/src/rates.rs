use fnv::FnvHashMap;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Currency the [`ExchangeRates`] are quoted in.
pub const QUOTE_CURRENCY: &str = "USD";

/// Currency → USD price table used to value wallets.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ExchangeRates(FnvHashMap<SmolStr, f64>);

impl ExchangeRates {
    pub fn set(&mut self, currency: &str, usd_price: f64) {
        self.0.insert(normalise(currency), usd_price);
    }

    /// USD price of one unit of the currency, if known.
    pub fn usd_price(&self, currency: &str) -> Option<f64> {
        let currency = normalise(currency);
        if currency == QUOTE_CURRENCY {
            return Some(1.0);
        }
        self.0.get(&currency).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<Currency> FromIterator<(Currency, f64)> for ExchangeRates
where
    Currency: AsRef<str>,
{
    fn from_iter<Iter: IntoIterator<Item = (Currency, f64)>>(iter: Iter) -> Self {
        let mut rates = Self::default();
        iter.into_iter()
            .for_each(|(currency, price)| rates.set(currency.as_ref(), price));
        rates
    }
}

/// `XBT` is BitMEX's code for bitcoin.
fn normalise(currency: &str) -> SmolStr {
    match currency.to_uppercase().as_str() {
        "XBT" => SmolStr::new_static("BTC"),
        other => SmolStr::new(other),
    }
}

/// Single exchange rate update.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateUpdate {
    pub currency: SmolStr,
    pub usd_price: f64,
}

/// Initialise an unbounded [`RateUpdate`] channel, returning the receiver half as a [`Stream`]
/// ready to pass to [`mirror_rates`].
pub fn rate_channel() -> (
    mpsc::UnboundedSender<RateUpdate>,
    UnboundedReceiverStream<RateUpdate>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, UnboundedReceiverStream::new(rx))
}

/// Mirror every [`RateUpdate`] into the `watch` channel read by the wallet serializers, until
/// the updates end or the [`CancellationToken`] is cancelled.
pub async fn mirror_rates<Updates>(
    updates: Updates,
    tx: watch::Sender<ExchangeRates>,
    cancel: CancellationToken,
) where
    Updates: Stream<Item = RateUpdate> + Send,
{
    let mut updates = std::pin::pin!(updates);

    loop {
        let update = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            update = updates.next() => update,
        };

        let Some(update) = update else {
            break;
        };

        tx.send_modify(|rates| rates.set(&update.currency, update.usd_price));
    }

    debug!("exchange rate mirror stopped");
}
