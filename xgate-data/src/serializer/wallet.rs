use super::{Context, Serializer, merge_field};
use crate::{
    error::DataError,
    event::{Action, Batch, Batches, Record, Table},
    rates::ExchangeRates,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{debug, trace};

/// Partial balance fields of one currency pushed by the exchange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BalanceUpdate {
    pub currency: SmolStr,
    pub balance: Option<f64>,
    pub available: Option<f64>,
    pub reserved: Option<f64>,
    pub unrealised_pnl: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl super::Keyed for BalanceUpdate {
    fn symbol(&self) -> Option<&str> {
        None
    }
}

/// Normalised balance of one currency.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Balance {
    pub account: SmolStr,
    pub currency: SmolStr,
    pub balance: f64,
    pub available: Option<f64>,
    pub reserved: Option<f64>,
    pub unrealised_pnl: Option<f64>,
    pub time: DateTime<Utc>,
}

impl Balance {
    fn merge(&mut self, update: BalanceUpdate, time: DateTime<Utc>) {
        if let Some(balance) = update.balance {
            self.balance = balance;
        }
        merge_field(&mut self.available, update.available);
        merge_field(&mut self.reserved, update.reserved);
        merge_field(&mut self.unrealised_pnl, update.unrealised_pnl);
        self.time = update.time.unwrap_or(time);
    }

    /// Balance including unrealised profit & loss.
    fn equity(&self) -> f64 {
        self.balance + self.unrealised_pnl.unwrap_or_default()
    }
}

/// Per `(account, currency)` balances merged from partial pushes.
#[derive(Debug, Default)]
pub struct BalanceBook {
    balances: FnvHashMap<(SmolStr, SmolStr), Balance>,
}

impl BalanceBook {
    /// Merge the update, returning the resulting [`Balance`] and whether it is new.
    ///
    /// A currency seen for the first time must carry a balance.
    pub fn merge(
        &mut self,
        account: &SmolStr,
        update: BalanceUpdate,
        time: DateTime<Utc>,
    ) -> Option<(bool, &Balance)> {
        let key = (account.clone(), update.currency.clone());

        if self.balances.contains_key(&key) {
            let balance = self.balances.get_mut(&key)?;
            balance.merge(update, time);
            return Some((false, balance));
        }

        let mut balance = Balance {
            account: account.clone(),
            currency: update.currency.clone(),
            balance: update.balance?,
            available: None,
            reserved: None,
            unrealised_pnl: None,
            time,
        };
        balance.merge(update, time);

        Some((true, self.balances.entry(key).or_insert(balance)))
    }

    /// Balances of the account.
    pub fn account<'a>(&'a self, account: &'a str) -> impl Iterator<Item = &'a Balance> + 'a {
        self.balances
            .values()
            .filter(move |balance| balance.account == account)
    }
}

fn is_balance_valid(item: &BalanceUpdate) -> bool {
    !item.currency.is_empty() && item.balance.is_none_or(f64::is_finite)
}

/// Per-currency balance records. New currencies are [`Action::Insert`]ed, known ones
/// [`Action::Update`]d, unless the message is a [`Action::Partial`].
#[derive(Debug, Default)]
pub struct WalletSerializer {
    book: BalanceBook,
}

impl Serializer for WalletSerializer {
    type Item = BalanceUpdate;
    const TABLE: Table = Table::Wallet;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        is_balance_valid(item)
    }

    fn load(
        &mut self,
        context: &Context<'_>,
        action: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        let Some((is_new, balance)) = self.book.merge(context.account, item, context.time) else {
            trace!("skipping balance of unknown currency without a balance value");
            return Ok(None);
        };

        let action = match (action, is_new) {
            (Action::Partial, _) => Action::Partial,
            (_, true) => Action::Insert,
            (_, false) => Action::Update,
        };

        Ok(Some((action, Record::Wallet(balance.clone()))))
    }
}

/// Portfolio level totals of an account.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WalletExtra {
    pub account: SmolStr,
    pub total_usd: f64,
    pub total_btc: Option<f64>,
    pub time: DateTime<Utc>,
}

/// Recomputes [`WalletExtra`] totals after every balance push, valuing each currency with the
/// current [`ExchangeRates`].
///
/// In strict mode any missing rate suppresses the output rather than emitting partial totals.
#[derive(Debug, Default)]
pub struct WalletExtraSerializer {
    book: BalanceBook,
}

impl WalletExtraSerializer {
    /// Merge the balance push into the book, returning whether it changed anything.
    fn merge(&mut self, context: &Context<'_>, item: BalanceUpdate) -> bool {
        let merged = self
            .book
            .merge(context.account, item, context.time)
            .is_some();

        if !merged {
            trace!("skipping balance of unknown currency without a balance value");
        }
        merged
    }

    fn totals(&self, context: &Context<'_>, rates: &ExchangeRates) -> Option<WalletExtra> {
        let mut total_usd = 0.0;

        for balance in self.book.account(context.account) {
            match rates.usd_price(&balance.currency) {
                Some(price) => total_usd += balance.equity() * price,
                None if context.register_state => {
                    debug!(
                        currency = %balance.currency,
                        "suppressing wallet totals, exchange rate unavailable"
                    );
                    return None;
                }
                None => trace!(currency = %balance.currency, "excluding currency without rate"),
            }
        }

        let total_btc = rates
            .usd_price("BTC")
            .filter(|price| *price > 0.0)
            .map(|price| total_usd / price);

        if total_btc.is_none() && context.register_state {
            debug!("suppressing wallet totals, BTC exchange rate unavailable");
            return None;
        }

        Some(WalletExtra {
            account: context.account.clone(),
            total_usd,
            total_btc,
            time: context.time,
        })
    }
}

impl Serializer for WalletExtraSerializer {
    type Item = BalanceUpdate;
    const TABLE: Table = Table::WalletExtra;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        is_balance_valid(item)
    }

    fn load(
        &mut self,
        context: &Context<'_>,
        _: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        self.merge(context, item);
        Ok(None)
    }

    /// Merges every item, then emits a single [`WalletExtra`] record for the account.
    fn get_data(
        &mut self,
        context: &Context<'_>,
        action: Action,
        items: Vec<Self::Item>,
    ) -> Result<Vec<Batch>, DataError> {
        let mut merged = false;
        for item in items {
            if self.is_item_valid(context, &item) && self.merge(context, item) {
                merged = true;
            }
        }

        if !merged {
            return Ok(Vec::new());
        }

        let rates = context.rates.borrow().clone();
        let Some(extra) = self.totals(context, &rates) else {
            return Ok(Vec::new());
        };

        let action = match action {
            Action::Partial => Action::Partial,
            _ => Action::Update,
        };

        let mut batches = Batches::default();
        batches.push(action, Record::WalletExtra(extra));
        Ok(batches.into_vec())
    }
}
