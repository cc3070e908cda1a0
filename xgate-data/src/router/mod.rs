use crate::{
    config::ConnectionConfig,
    error::DataError,
    event::{Envelope, Table},
    exchange::{
        Connector, Control, ExchangeId, ExchangeMessage, Frame, Schema, binance::Binance,
        bitmex::Bitmex,
    },
    rates::ExchangeRates,
    registry::{SubscriberId, SubscriptionRegistry, SymbolKey},
    serializer::{Context, Serializers},
    store::StateStore,
};
use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use std::{
    fmt::{Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Classifies raw frames of one connection and turns data messages into [`Envelope`]s.
///
/// Owns the [`SubscriptionRegistry`] and one instance of every
/// [`Serializer`](crate::serializer::Serializer), reused across all messages of the connection.
/// All incremental state lives in the serializers, the router itself keeps none between
/// messages.
pub struct Router<Exchange> {
    account: SmolStr,
    schema: Schema,
    register_state: bool,
    registry: SubscriptionRegistry<Table>,
    serializers: Serializers,
    store: Arc<dyn StateStore>,
    rates: watch::Receiver<ExchangeRates>,
    exchange: PhantomData<Exchange>,
}

impl<Exchange> Debug for Router<Exchange>
where
    Exchange: Connector,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("exchange", &Exchange::ID)
            .field("account", &self.account)
            .field("schema", &self.schema)
            .field("register_state", &self.register_state)
            .field("registry", &self.registry)
            .finish()
    }
}

impl<Exchange> Router<Exchange>
where
    Exchange: Connector,
{
    /// Construct a new [`Router`] with strict enrichment and no exchange rates.
    pub fn new<Account>(
        account: Account,
        schema: Schema,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, DataError>
    where
        Account: Into<SmolStr>,
    {
        if !Exchange::supports(schema) {
            return Err(DataError::Config(format!(
                "{} does not serve schema: {schema}",
                Exchange::ID
            )));
        }

        Ok(Self {
            account: account.into(),
            schema,
            register_state: true,
            registry: SubscriptionRegistry::default(),
            serializers: Serializers::default(),
            store,
            rates: watch::channel(ExchangeRates::default()).1,
            exchange: PhantomData,
        })
    }

    pub fn with_register_state(self, register_state: bool) -> Self {
        Self {
            register_state,
            ..self
        }
    }

    pub fn with_rates(self, rates: watch::Receiver<ExchangeRates>) -> Self {
        Self { rates, ..self }
    }

    pub fn set_rates(&mut self, rates: watch::Receiver<ExchangeRates>) {
        self.rates = rates;
    }

    pub fn account(&self) -> &SmolStr {
        &self.account
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn registry(&self) -> &SubscriptionRegistry<Table> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SubscriptionRegistry<Table> {
        &mut self.registry
    }

    /// Drop all serializer working state, eg/ after the transport reconnected.
    pub fn reset_serializers(&mut self) {
        debug!(exchange = %Exchange::ID, account = %self.account, "resetting serializer state");
        self.serializers = Serializers::default();
    }

    /// Process one raw transport frame, invoking `on_event` for every [`Envelope`] produced.
    ///
    /// Returns `true` only for control frames signalling the caller should stop consuming.
    pub fn process_message<FnOnEvent>(&mut self, payload: &str, on_event: FnOnEvent) -> bool
    where
        FnOnEvent: FnMut(Envelope),
    {
        self.process(payload, on_event).is_some()
    }

    /// [`Self::process_message`], returning the [`Control`] reason of a control frame.
    pub fn process<FnOnEvent>(&mut self, payload: &str, on_event: FnOnEvent) -> Option<Control>
    where
        FnOnEvent: FnMut(Envelope),
    {
        match Exchange::parse(payload) {
            Ok(Frame::Data(message)) => {
                self.route(message, Utc::now(), on_event);
                None
            }
            Ok(Frame::Control(control)) => {
                info!(
                    exchange = %Exchange::ID,
                    account = %self.account,
                    %control,
                    "received control frame"
                );
                Some(control)
            }
            Ok(Frame::Response(response)) => {
                debug!(
                    exchange = %Exchange::ID,
                    ?response,
                    "ignoring unsolicited command response"
                );
                None
            }
            Ok(Frame::Ignore) => None,
            Err(error) => {
                warn!(exchange = %Exchange::ID, ?error, payload, "dropping unparseable frame");
                None
            }
        }
    }

    /// Fan a data message out to every [`Table`] its tag maps to.
    ///
    /// A fault in one table branch suppresses only that branch.
    pub fn route<FnOnEvent>(
        &mut self,
        message: Exchange::Message,
        time: DateTime<Utc>,
        mut on_event: FnOnEvent,
    ) where
        FnOnEvent: FnMut(Envelope),
    {
        let tag = message.tag();
        let action = message.action();

        for &table in Exchange::tables(self.schema, tag) {
            if self.registry.is_unregistered(&table, None) {
                trace!(%table, tag, "skipping table without subscribers");
                continue;
            }

            let mut updates = match Exchange::updates(self.schema, table, &message) {
                Ok(updates) => updates,
                Err(error) => {
                    warn!(
                        exchange = %Exchange::ID,
                        %table,
                        tag,
                        %error,
                        "failed to extract updates"
                    );
                    continue;
                }
            };

            let registry = &self.registry;
            updates.retain(|symbol| registry.is_registered(&table, Some(symbol)));
            if updates.is_empty() {
                continue;
            }

            let context = Context {
                exchange: Exchange::ID,
                schema: self.schema,
                account: &self.account,
                store: self.store.as_ref(),
                register_state: self.register_state,
                rates: &self.rates,
                time,
            };

            let batches = match self.serializers.get_data(&context, action, updates) {
                Ok(batches) => batches,
                Err(error) => {
                    warn!(exchange = %Exchange::ID, %table, tag, %error, "serializer fault");
                    continue;
                }
            };

            batches
                .into_iter()
                .filter(|batch| !batch.records.is_empty())
                .for_each(|batch| {
                    on_event(Envelope {
                        account: self.account.clone(),
                        table,
                        schema: self.schema,
                        action: batch.action,
                        data: batch.records,
                    })
                });
        }
    }
}

/// [`Router`] for any supported exchange, resolved once from the [`ExchangeId`] at construction.
#[derive(Debug)]
pub enum AnyRouter {
    Binance(Router<Binance>),
    Bitmex(Router<Bitmex>),
}

impl AnyRouter {
    /// Construct the [`Router`] described by the [`ConnectionConfig`].
    pub fn from_config(
        config: &ConnectionConfig,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, DataError> {
        let router = match config.exchange {
            ExchangeId::Binance => Self::Binance(
                Router::new(config.account.clone(), config.schema, store)?
                    .with_register_state(config.register_state),
            ),
            ExchangeId::Bitmex => Self::Bitmex(
                Router::new(config.account.clone(), config.schema, store)?
                    .with_register_state(config.register_state),
            ),
        };

        Ok(router)
    }

    pub fn exchange(&self) -> ExchangeId {
        match self {
            AnyRouter::Binance(_) => Binance::ID,
            AnyRouter::Bitmex(_) => Bitmex::ID,
        }
    }

    pub fn process_message<FnOnEvent>(&mut self, payload: &str, on_event: FnOnEvent) -> bool
    where
        FnOnEvent: FnMut(Envelope),
    {
        match self {
            AnyRouter::Binance(router) => router.process_message(payload, on_event),
            AnyRouter::Bitmex(router) => router.process_message(payload, on_event),
        }
    }

    pub fn register(
        &mut self,
        subscriber: SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> (bool, SymbolKey) {
        self.registry_mut().register(subscriber, table, symbol)
    }

    pub fn unregister(
        &mut self,
        subscriber: &SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> (bool, Option<SymbolKey>) {
        self.registry_mut().unregister(subscriber, &table, symbol)
    }

    pub fn set_rates(&mut self, rates: watch::Receiver<ExchangeRates>) {
        match self {
            AnyRouter::Binance(router) => router.set_rates(rates),
            AnyRouter::Bitmex(router) => router.set_rates(rates),
        }
    }

    fn registry_mut(&mut self) -> &mut SubscriptionRegistry<Table> {
        match self {
            AnyRouter::Binance(router) => router.registry_mut(),
            AnyRouter::Bitmex(router) => router.registry_mut(),
        }
    }
}
