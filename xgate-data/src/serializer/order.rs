use super::{Context, Keyed, Serializer, merge_field};
use crate::{
    error::DataError,
    event::{Action, Record, Side, Table},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};
use tracing::trace;

/// Exchange order status, accepted in either `SCREAMING_SNAKE` or `PascalCase`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PendingNew,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    ExpiredInMatch,
    NewInsurance,
    NewAdl,
}

impl OrderStatus {
    /// Parse an exchange status string, ignoring case and underscores.
    pub fn parse(input: &str) -> Option<Self> {
        let normalised = input.replace('_', "").to_uppercase();
        Some(match normalised.as_str() {
            "NEW" => Self::New,
            "PENDINGNEW" => Self::PendingNew,
            "PARTIALLYFILLED" => Self::PartiallyFilled,
            "FILLED" => Self::Filled,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            "PENDINGCANCEL" => Self::PendingCancel,
            "REJECTED" => Self::Rejected,
            "EXPIRED" => Self::Expired,
            "EXPIREDINMATCH" => Self::ExpiredInMatch,
            "NEWINSURANCE" => Self::NewInsurance,
            "NEWADL" => Self::NewAdl,
            _ => return None,
        })
    }

    pub fn state(&self) -> OrderState {
        match self {
            OrderStatus::PendingNew => OrderState::Pending,
            OrderStatus::New
            | OrderStatus::PartiallyFilled
            | OrderStatus::PendingCancel
            | OrderStatus::NewInsurance
            | OrderStatus::NewAdl => OrderState::Active,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected => {
                OrderState::Closed
            }
            OrderStatus::Expired | OrderStatus::ExpiredInMatch => OrderState::Expired,
        }
    }

    /// [`Action`] a record in this status is emitted with.
    pub fn action(&self) -> Action {
        match self {
            OrderStatus::New | OrderStatus::PendingNew => Action::Insert,
            OrderStatus::Filled
            | OrderStatus::Canceled
            | OrderStatus::Rejected
            | OrderStatus::Expired
            | OrderStatus::ExpiredInMatch => Action::Delete,
            _ => Action::Update,
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let input = String::deserialize(deserializer)?;
        OrderStatus::parse(&input)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown order status: {input}")))
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Coarse lifecycle bucket of an [`OrderStatus`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    Active,
    Closed,
    Expired,
}

/// Partial order fields pushed by the exchange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderUpdate {
    pub order_id: SmolStr,
    pub client_order_id: Option<SmolStr>,
    pub symbol: Option<SmolStr>,
    pub status: Option<OrderStatus>,
    pub side: Option<Side>,
    pub kind: Option<SmolStr>,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub volume: Option<f64>,
    pub filled_volume: Option<f64>,
    pub average_price: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl Keyed for OrderUpdate {
    fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
}

impl OrderUpdate {
    fn merge(&mut self, update: OrderUpdate) {
        merge_field(&mut self.client_order_id, update.client_order_id);
        merge_field(&mut self.symbol, update.symbol);
        merge_field(&mut self.status, update.status);
        merge_field(&mut self.side, update.side);
        merge_field(&mut self.kind, update.kind);
        merge_field(&mut self.price, update.price);
        merge_field(&mut self.stop_price, update.stop_price);
        merge_field(&mut self.volume, update.volume);
        merge_field(&mut self.filled_volume, update.filled_volume);
        merge_field(&mut self.average_price, update.average_price);
        merge_field(&mut self.time, update.time);
    }
}

/// Normalised account order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub account: SmolStr,
    pub order_id: SmolStr,
    pub client_order_id: Option<SmolStr>,
    pub symbol: SmolStr,
    pub status: OrderStatus,
    pub state: OrderState,
    pub side: Option<Side>,
    pub kind: Option<SmolStr>,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub volume: Option<f64>,
    pub filled_volume: Option<f64>,
    pub average_price: Option<f64>,
    pub time: DateTime<Utc>,
}

/// Tracks open orders by id, deriving the [`Action`] of each record from its [`OrderStatus`].
///
/// BitMEX pushes only the changed fields of an order, so updates are merged onto the cached
/// order before emission. Terminal orders are evicted.
#[derive(Debug, Default)]
pub struct OrderSerializer {
    orders: FnvHashMap<SmolStr, OrderUpdate>,
}

impl Serializer for OrderSerializer {
    type Item = OrderUpdate;
    const TABLE: Table = Table::Order;

    fn is_item_valid(&self, _: &Context<'_>, item: &Self::Item) -> bool {
        !item.order_id.is_empty()
    }

    fn load(
        &mut self,
        context: &Context<'_>,
        _: Action,
        item: Self::Item,
    ) -> Result<Option<(Action, Record)>, DataError> {
        let merged = match self.orders.remove(&item.order_id) {
            Some(mut cached) => {
                cached.merge(item);
                cached
            }
            None => item,
        };

        let (Some(status), Some(symbol)) = (merged.status, merged.symbol.clone()) else {
            trace!(order_id = %merged.order_id, "skipping order with unknown status or symbol");
            self.orders.insert(merged.order_id.clone(), merged);
            return Ok(None);
        };

        let action = status.action();
        let order = Order {
            account: context.account.clone(),
            order_id: merged.order_id.clone(),
            client_order_id: merged.client_order_id.clone(),
            symbol,
            status,
            state: status.state(),
            side: merged.side,
            kind: merged.kind.clone(),
            price: merged.price,
            stop_price: merged.stop_price,
            volume: merged.volume,
            filled_volume: merged.filled_volume,
            average_price: merged.average_price,
            time: merged.time.unwrap_or(context.time),
        };

        if action != Action::Delete {
            self.orders.insert(merged.order_id.clone(), merged);
        }

        Ok(Some((action, Record::Order(order))))
    }
}
