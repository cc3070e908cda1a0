use crate::{
    credential::CredentialProvider,
    error::DataError,
    event::{Envelope, Table},
    exchange::{Connector, Control, ExchangeChannel, ExchangeId, Frame, Op, PingInterval},
    rates::{ExchangeRates, RateUpdate, mirror_rates},
    registry::{SubscriberId, SubscriptionRegistry, SymbolKey},
    router::Router,
    supervisor::{
        reconnect::{ReconnectionBackoffPolicy, connect_with_backoff},
        transport::Transport,
    },
};
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display};
use fnv::FnvHashSet;
use futures::Stream;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xgate_integration::{
    Validator,
    channel::{ChannelTxDroppable, Tx},
    protocol::websocket::WsMessage,
    rate_limit::{Priority, RateLimits},
};

/// Reconnection backoff policy and [`connect_with_backoff`].
pub mod reconnect;

/// [`Transport`] abstraction over the WebSocket a [`Connection`] drives.
pub mod transport;

/// Class of outbound request sharing one rate limit budget per exchange.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub enum RequestClass {
    #[display("command")]
    Command,
    #[display("auth")]
    Auth,
}

/// Structured key of a rate limit budget.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor,
)]
pub struct RateLimitKey {
    pub exchange: ExchangeId,
    pub class: RequestClass,
}

/// Default [`RateLimits`] for outbound socket commands.
///
/// Binance accepts at most 5 incoming messages per second per connection.
pub fn default_rate_limits() -> RateLimits<RateLimitKey> {
    RateLimits::new(10, Duration::from_secs(1)).with_quota(
        RateLimitKey::new(ExchangeId::Binance, RequestClass::Command),
        5,
        Duration::from_secs(1),
    )
}

/// Reason [`Connection::run`] stopped consuming frames.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Shutdown {
    /// The [`CancellationToken`] was cancelled.
    Cancelled,
    /// The exchange sent a control frame signalling the stream is over.
    Control,
    /// The transport closed or failed.
    Disconnected,
}

/// Registration removed from the registry during [`Connection::reconnect`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DroppedSubscription {
    pub table: Table,
    pub key: SymbolKey,
    pub subscribers: Vec<SubscriberId>,
}

/// Owns one exchange connection: the [`Transport`], the [`Router`] (and through it the
/// registry & serializers), credentials, rate limits and every auxiliary task.
///
/// Frames are processed strictly in arrival order. Data frames received while waiting for a
/// command acknowledgement are buffered and routed before the next inbound frame.
///
/// Before [`Self::run`] subscriptions are changed directly through [`Self::subscribe`] and
/// [`Self::unsubscribe`]. While it runs they are changed through a [`ConnectionHandle`], whose
/// commands are actioned by the same task consuming the stream. Cancelling the
/// [`CancellationToken`] ends the connection for good.
pub struct Connection<Exchange, T>
where
    Exchange: Connector,
{
    router: Router<Exchange>,
    transport: T,
    credentials: Option<Arc<dyn CredentialProvider>>,
    authenticated: bool,
    rate_limits: RateLimits<RateLimitKey>,
    subscription_timeout: Duration,
    request_id: u64,
    pending: VecDeque<(Exchange::Message, DateTime<Utc>)>,
    control: Option<Control>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

impl<Exchange, T> Debug for Connection<Exchange, T>
where
    Exchange: Connector,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("router", &self.router)
            .field("credentials", &self.credentials)
            .field("authenticated", &self.authenticated)
            .field("subscription_timeout", &self.subscription_timeout)
            .field("request_id", &self.request_id)
            .field("pending", &self.pending.len())
            .field("control", &self.control)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl<Exchange, T> Connection<Exchange, T>
where
    Exchange: Connector,
    T: Transport,
{
    pub fn new(router: Router<Exchange>, transport: T) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Self {
            router,
            transport,
            credentials: None,
            authenticated: false,
            rate_limits: default_rate_limits(),
            subscription_timeout: Exchange::subscription_timeout(),
            request_id: 0,
            pending: VecDeque::new(),
            control: None,
            commands_tx,
            commands_rx,
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_credentials(self, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials: Some(credentials),
            ..self
        }
    }

    pub fn with_rate_limits(self, rate_limits: RateLimits<RateLimitKey>) -> Self {
        Self {
            rate_limits,
            ..self
        }
    }

    pub fn with_subscription_timeout(self, subscription_timeout: Duration) -> Self {
        Self {
            subscription_timeout,
            ..self
        }
    }

    /// Mirror the provided exchange rate updates into the wallet serializers.
    ///
    /// The mirroring task is tracked by the [`Connection`] and stopped by [`Self::shutdown`].
    /// Must be called from within a tokio runtime.
    pub fn with_rates<Updates>(mut self, updates: Updates) -> Self
    where
        Updates: Stream<Item = RateUpdate> + Send + 'static,
    {
        let (tx, rx) = watch::channel(ExchangeRates::default());
        self.router.set_rates(rx);
        self.tasks
            .spawn(mirror_rates(updates, tx, self.cancel.child_token()));
        self
    }

    pub fn router(&self) -> &Router<Exchange> {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router<Exchange> {
        &mut self.router
    }

    pub fn registry(&self) -> &SubscriptionRegistry<Table> {
        self.router.registry()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// [`CancellationToken`] stopping [`Self::run`] and every auxiliary task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// [`ConnectionHandle`] changing subscriptions while [`Self::run`] consumes the stream.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            tx: self.commands_tx.clone(),
        }
    }

    fn command_key() -> RateLimitKey {
        RateLimitKey::new(Exchange::ID, RequestClass::Command)
    }

    /// Authenticate the connection with the current secret of the [`CredentialProvider`],
    /// refreshing it first if it is about to expire.
    pub async fn authenticate(&mut self) -> Result<(), DataError> {
        let provider = self
            .credentials
            .clone()
            .ok_or_else(|| DataError::Credential("no credential provider".to_string()))?;

        if provider.is_expiring() {
            info!(exchange = %Exchange::ID, "refreshing expiring credential");
            provider.refresh().await?;
        }

        let credential = provider
            .current_secret()
            .ok_or_else(|| DataError::Credential("provider holds no secret".to_string()))?;

        if let Some(request) = Exchange::auth_request(&credential, Utc::now())? {
            self.rate_limits
                .acquire(
                    &RateLimitKey::new(Exchange::ID, RequestClass::Auth),
                    Priority::High,
                )
                .await;
            self.transport.send(request).await?;
            self.await_responses(1).await?;
        }

        info!(
            exchange = %Exchange::ID,
            account = %self.router.account(),
            "connection authenticated"
        );
        self.authenticated = true;
        Ok(())
    }

    /// Subscribe the subscriber to the table for one symbol, or every symbol if `None`.
    ///
    /// Returns `true` once the exchange acknowledged every command needed. On failure the
    /// registry is left as it was before the call.
    pub async fn subscribe(
        &mut self,
        subscriber: SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> bool {
        match self.try_subscribe(subscriber, table, symbol).await {
            Ok(()) => true,
            Err(error) => {
                warn!(exchange = %Exchange::ID, %table, ?symbol, %error, "subscribe failed");
                false
            }
        }
    }

    async fn try_subscribe(
        &mut self,
        subscriber: SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> Result<(), DataError> {
        if table.is_private() && !self.authenticated {
            return Err(DataError::NotAuthenticated(table));
        }

        let snapshot = self.router.registry().clone();
        let active = self.active_channels();
        let keys_before = snapshot.keys(&table);

        let (changed, key) = self
            .router
            .registry_mut()
            .register(subscriber, table, symbol);

        if !changed {
            return Ok(());
        }

        let result = self.subscribe_key(table, &key, &active).await;
        if result.is_err() {
            *self.router.registry_mut() = snapshot;
            return result;
        }

        // Specific keys absorbed by a new wildcard no longer need their own channels
        if key.is_all() {
            let absorbed = keys_before.iter().filter(|key| !key.is_all()).cloned();
            self.release_channels(table, absorbed).await;
        }

        Ok(())
    }

    async fn subscribe_key(
        &mut self,
        table: Table,
        key: &SymbolKey,
        active: &FnvHashSet<ExchangeChannel>,
    ) -> Result<(), DataError> {
        let channels = Exchange::channels(self.router.schema(), table, key)?
            .into_iter()
            .filter(|channel| !active.contains(channel))
            .unique()
            .collect_vec();

        self.subscribe_channels(&channels).await
    }

    /// Subscribe the channels. If the command was sent but not acknowledged in full, the
    /// channels are unsubscribed again so the exchange does not keep streaming them.
    async fn subscribe_channels(&mut self, channels: &[ExchangeChannel]) -> Result<(), DataError> {
        if channels.is_empty() {
            return Ok(());
        }

        let expected = self.send_command(Op::Subscribe, channels).await?;
        let Err(error) = self.confirm(expected).await else {
            return Ok(());
        };

        // One rejected acknowledgement covers every channel of the command
        let rejected = expected == 1 && matches!(error, DataError::SubscribeRejected(_));
        if rejected || self.control.is_some() || error.is_terminal() {
            return Err(error);
        }

        debug!(
            exchange = %Exchange::ID,
            channels = %channels.iter().join(","),
            %error,
            "unsubscribing channels of failed subscribe"
        );

        let released = if self.cancel.is_cancelled() {
            self.send_command(Op::Unsubscribe, channels).await.map(|_| ())
        } else {
            self.command(Op::Unsubscribe, channels).await
        };
        if let Err(error) = released {
            warn!(exchange = %Exchange::ID, %error, "failed to unsubscribe channels of failed subscribe");
        }

        Err(error)
    }

    /// Unsubscribe the subscriber from the table for one symbol, or the wildcard if `None`.
    ///
    /// Removing a registration that does not exist returns `false`. Exchange channels are only
    /// released once no remaining registration needs them.
    pub async fn unsubscribe(
        &mut self,
        subscriber: &SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> bool {
        match self.try_unsubscribe(subscriber, table, symbol).await {
            Ok(removed) => removed,
            Err(error) => {
                warn!(exchange = %Exchange::ID, %table, ?symbol, %error, "unsubscribe failed");
                false
            }
        }
    }

    async fn try_unsubscribe(
        &mut self,
        subscriber: &SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> Result<bool, DataError> {
        let snapshot = self.router.registry().clone();

        let (now_empty, key) = self
            .router
            .registry_mut()
            .unregister(subscriber, &table, symbol);

        let Some(key) = key else {
            return Ok(false);
        };

        if !now_empty {
            return Ok(true);
        }

        let channels = self.exclusive_channels(table, &key)?;
        if let Err(error) = self.command(Op::Unsubscribe, &channels).await {
            *self.router.registry_mut() = snapshot;
            return Err(error);
        }

        Ok(true)
    }

    /// Best effort unsubscribe of channels no longer needed by any registration.
    async fn release_channels<Keys>(&mut self, table: Table, keys: Keys)
    where
        Keys: IntoIterator<Item = SymbolKey>,
    {
        let mut channels = Vec::new();
        for key in keys {
            match self.exclusive_channels(table, &key) {
                Ok(exclusive) => channels.extend(exclusive),
                Err(error) => debug!(%table, %key, %error, "no channels to release"),
            }
        }

        let channels = channels.into_iter().unique().collect_vec();
        if let Err(error) = self.command(Op::Unsubscribe, &channels).await {
            warn!(exchange = %Exchange::ID, %table, %error, "failed to release absorbed channels");
        }
    }

    /// Channels of the `(table, key)` pair not needed by any currently registered pair.
    fn exclusive_channels(
        &self,
        table: Table,
        key: &SymbolKey,
    ) -> Result<Vec<ExchangeChannel>, DataError> {
        let active = self.active_channels();

        Ok(Exchange::channels(self.router.schema(), table, key)?
            .into_iter()
            .filter(|channel| !active.contains(channel))
            .unique()
            .collect())
    }

    /// Every exchange channel carrying a currently registered `(table, key)` pair.
    fn active_channels(&self) -> FnvHashSet<ExchangeChannel> {
        let schema = self.router.schema();

        self.router
            .registry()
            .iter()
            .filter_map(|(table, key)| Exchange::channels(schema, *table, key).ok())
            .flatten()
            .collect()
    }

    /// Send the command frames for the channels and wait for every acknowledgement.
    async fn command(&mut self, op: Op, channels: &[ExchangeChannel]) -> Result<(), DataError> {
        if channels.is_empty() {
            return Ok(());
        }

        let expected = self.send_command(op, channels).await?;
        self.confirm(expected).await
    }

    /// Send the command frames for the channels, returning the number of acknowledgements
    /// expected in response.
    async fn send_command(&mut self, op: Op, channels: &[ExchangeChannel]) -> Result<usize, DataError> {
        self.request_id += 1;
        let requests = Exchange::requests(op, channels, self.request_id);

        debug!(
            exchange = %Exchange::ID,
            ?op,
            channels = %channels.iter().join(","),
            request_id = self.request_id,
            "sending command"
        );

        let key = Self::command_key();
        for request in requests {
            self.rate_limits.acquire(&key, Priority::Normal).await;
            self.transport.send(request).await?;
        }

        Ok(Exchange::expected_responses(channels))
    }

    /// Wait for the acknowledgements of a sent command. Once the exchange accepted it, any rate
    /// limit backoff of outbound commands is lifted.
    async fn confirm(&mut self, expected: usize) -> Result<(), DataError> {
        self.await_responses(expected).await?;
        self.rate_limits
            .limiter(&Self::command_key())
            .reset_backoff()
            .await;
        Ok(())
    }

    /// Wait for `expected` acknowledgements, bounded by the subscription timeout.
    async fn await_responses(&mut self, expected: usize) -> Result<(), DataError> {
        let timeout = self.subscription_timeout;
        let cancel = self.cancel.clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DataError::Cancelled),
            result = tokio::time::timeout(timeout, self.collect_responses(expected)) => {
                result.unwrap_or(Err(DataError::SubscribeTimeout(timeout.as_millis() as u64)))
            }
        }
    }

    async fn collect_responses(&mut self, expected: usize) -> Result<(), DataError> {
        let mut received = 0;
        let mut result = Ok(());

        while received < expected {
            let Some(payload) = self.transport.recv().await else {
                return Err(DataError::Socket(
                    "transport closed while awaiting acknowledgement".to_string(),
                ));
            };

            match Exchange::parse(&payload?) {
                Ok(Frame::Response(response)) => {
                    received += 1;
                    if let Err(error) = response.validate() {
                        result = Err(DataError::from(error));
                    }
                }
                Ok(Frame::Data(message)) => self.pending.push_back((message, Utc::now())),
                Ok(Frame::Control(control)) => {
                    let error = DataError::Socket(control.to_string());
                    self.on_control(control).await;
                    return Err(error);
                }
                Ok(Frame::Ignore) => {}
                Err(error) => warn!(exchange = %Exchange::ID, %error, "dropping unparseable frame"),
            }
        }

        result
    }

    /// Latch a [`Control`] frame for [`Self::run`] to stop on. A throttled connection also
    /// backs off every outbound command sharing its rate limit.
    async fn on_control(&mut self, control: Control) {
        if let Control::RateLimited(reason) = &control {
            warn!(exchange = %Exchange::ID, %reason, "rate limited, backing off commands");
            self.rate_limits
                .limiter(&Self::command_key())
                .report_violation()
                .await;
        }

        self.control = Some(control);
    }

    /// Action a [`Command`] received through a [`ConnectionHandle`].
    async fn execute(&mut self, command: Command) {
        let (outcome, reply) = match command {
            Command::Subscribe {
                subscriber,
                table,
                symbol,
                reply,
            } => (
                self.subscribe(subscriber, table, symbol.as_deref()).await,
                reply,
            ),
            Command::Unsubscribe {
                subscriber,
                table,
                symbol,
                reply,
            } => (
                self.unsubscribe(&subscriber, table, symbol.as_deref()).await,
                reply,
            ),
        };

        if reply.send(outcome).is_err() {
            debug!(exchange = %Exchange::ID, "command requester dropped before the reply");
        }
    }

    /// Process inbound frames in arrival order, invoking `on_event` for every [`Envelope`],
    /// until cancelled, a control frame arrives, or the transport disconnects.
    ///
    /// Commands sent through a [`ConnectionHandle`] are actioned between frames.
    pub async fn run<FnOnEvent>(&mut self, mut on_event: FnOnEvent) -> Shutdown
    where
        FnOnEvent: FnMut(Envelope),
    {
        let cancel = self.cancel.clone();
        let mut ping_interval = Exchange::ping_interval();

        loop {
            while let Some((message, time)) = self.pending.pop_front() {
                self.router.route(message, time, &mut on_event);
            }

            if let Some(control) = self.control.take() {
                debug!(exchange = %Exchange::ID, %control, "stopping on control frame");
                return Shutdown::Control;
            }

            let inbound = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Shutdown::Cancelled,
                ping = next_ping(&mut ping_interval) => Inbound::Ping(ping),
                Some(command) = self.commands_rx.recv() => Inbound::Command(command),
                payload = self.transport.recv() => Inbound::Payload(payload),
            };

            let payload = match inbound {
                Inbound::Ping(ping) => {
                    debug!(
                        exchange = %Exchange::ID,
                        payload = ?ping,
                        "sending custom application-level ping to exchange"
                    );
                    if let Err(error) = self.transport.send(ping).await {
                        warn!(exchange = %Exchange::ID, %error, "failed to send ping");
                        if error.is_terminal() {
                            return Shutdown::Disconnected;
                        }
                    }
                    continue;
                }
                Inbound::Command(command) => {
                    self.execute(command).await;
                    continue;
                }
                Inbound::Payload(payload) => payload,
            };

            match payload {
                None => {
                    info!(exchange = %Exchange::ID, "transport closed");
                    return Shutdown::Disconnected;
                }
                Some(Err(error)) if error.is_terminal() => {
                    warn!(exchange = %Exchange::ID, %error, "transport failed");
                    return Shutdown::Disconnected;
                }
                Some(Err(error)) => {
                    warn!(exchange = %Exchange::ID, %error, "failed to receive frame");
                }
                Some(Ok(payload)) => {
                    if let Some(control) = self.router.process(&payload, &mut on_event) {
                        self.on_control(control).await;
                    }
                }
            }
        }
    }

    /// [`Self::run`], forwarding every [`Envelope`] into the channel. Envelopes are discarded
    /// once the receiver has been dropped.
    pub async fn run_into<ChannelTx>(&mut self, tx: ChannelTx) -> Shutdown
    where
        ChannelTx: Tx<Item = Envelope>,
    {
        let mut tx = ChannelTxDroppable::new(tx);
        self.run(|envelope| tx.send(envelope)).await
    }

    /// Swap in a freshly connected [`Transport`] and replay every registered pair.
    ///
    /// Serializer state is reset. Private pairs are dropped from the registry if the new
    /// connection could not be authenticated, as are pairs the exchange rejects. The dropped
    /// registrations are returned so the caller can resubscribe later.
    pub async fn reconnect(&mut self, transport: T) -> Vec<DroppedSubscription> {
        self.transport = transport;
        self.authenticated = false;
        self.pending.clear();
        self.control = None;
        self.router.reset_serializers();

        if self.credentials.is_some() {
            if let Err(error) = self.authenticate().await {
                warn!(exchange = %Exchange::ID, %error, "failed to re-authenticate");
            }
        }

        let pairs = self
            .router
            .registry()
            .iter()
            .map(|(table, key)| (*table, key.clone()))
            .sorted()
            .collect_vec();

        let mut replayed = FnvHashSet::default();
        let mut dropped = Vec::new();

        for (table, key) in pairs {
            let result = if table.is_private() && !self.authenticated {
                Err(DataError::NotAuthenticated(table))
            } else {
                self.subscribe_key(table, &key, &replayed).await
            };

            match result {
                Ok(()) => {
                    if let Ok(channels) = Exchange::channels(self.router.schema(), table, &key) {
                        replayed.extend(channels);
                    }
                }
                Err(error) => {
                    warn!(
                        exchange = %Exchange::ID,
                        %table,
                        %key,
                        %error,
                        "dropping subscription on reconnect"
                    );
                    let subscribers = self.router.registry_mut().remove(&table, &key);
                    dropped.push(DroppedSubscription {
                        table,
                        key,
                        subscribers,
                    });
                }
            }
        }

        info!(
            exchange = %Exchange::ID,
            replayed = replayed.len(),
            dropped = dropped.len(),
            "resubscribed after reconnect"
        );

        dropped
    }

    /// [`Self::run`] until cancelled, reconnecting with backoff whenever the stream ends.
    pub async fn run_with_reconnect<FnConnect, ConnectFut, FnOnEvent>(
        &mut self,
        policy: ReconnectionBackoffPolicy,
        mut connect: FnConnect,
        mut on_event: FnOnEvent,
    ) where
        FnConnect: FnMut() -> ConnectFut,
        ConnectFut: Future<Output = Result<T, DataError>>,
        FnOnEvent: FnMut(Envelope),
    {
        let cancel = self.cancel.clone();

        loop {
            let shutdown = self.run(&mut on_event).await;
            info!(exchange = %Exchange::ID, ?shutdown, "connection stopped");

            if shutdown == Shutdown::Cancelled {
                return;
            }

            let Some(transport) = connect_with_backoff(policy.clone(), &cancel, &mut connect).await
            else {
                return;
            };

            let dropped = self.reconnect(transport).await;
            if !dropped.is_empty() {
                warn!(exchange = %Exchange::ID, ?dropped, "subscriptions dropped on reconnect");
            }
        }
    }

    /// Cancel [`Self::run`] and every auxiliary task, waiting for the tasks to finish before
    /// closing the transport.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        while self.tasks.join_next().await.is_some() {}

        if let Err(error) = self.transport.close().await {
            debug!(exchange = %Exchange::ID, %error, "failed to close transport cleanly");
        }
    }
}

/// Cloneable handle changing the subscriptions of a running [`Connection`].
///
/// Each call resolves once the [`Connection`] actioned the command, with the same outcome as
/// [`Connection::subscribe`] / [`Connection::unsubscribe`]. Commands sent before
/// [`Connection::run`] starts are queued until it does.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    pub async fn subscribe(
        &self,
        subscriber: SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> bool {
        let symbol = symbol.map(SmolStr::new);
        self.request(|reply| Command::Subscribe {
            subscriber,
            table,
            symbol,
            reply,
        })
        .await
    }

    pub async fn unsubscribe(
        &self,
        subscriber: SubscriberId,
        table: Table,
        symbol: Option<&str>,
    ) -> bool {
        let symbol = symbol.map(SmolStr::new);
        self.request(|reply| Command::Unsubscribe {
            subscriber,
            table,
            symbol,
            reply,
        })
        .await
    }

    async fn request<FnCommand>(&self, command: FnCommand) -> bool
    where
        FnCommand: FnOnce(oneshot::Sender<bool>) -> Command,
    {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(command(reply)).is_err() {
            warn!("connection dropped, command not delivered");
            return false;
        }

        rx.await.unwrap_or(false)
    }
}

/// Subscription change sent by a [`ConnectionHandle`].
#[derive(Debug)]
enum Command {
    Subscribe {
        subscriber: SubscriberId,
        table: Table,
        symbol: Option<SmolStr>,
        reply: oneshot::Sender<bool>,
    },
    Unsubscribe {
        subscriber: SubscriberId,
        table: Table,
        symbol: Option<SmolStr>,
        reply: oneshot::Sender<bool>,
    },
}

enum Inbound {
    Ping(WsMessage),
    Command(Command),
    Payload(Option<Result<String, DataError>>),
}

/// Await the next tick of the exchange [`PingInterval`], never resolving if there is none.
async fn next_ping(ping_interval: &mut Option<PingInterval>) -> WsMessage {
    match ping_interval {
        Some(PingInterval { interval, ping }) => {
            interval.tick().await;
            ping()
        }
        None => std::future::pending().await,
    }
}
