#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::pedantic, clippy::type_complexity)]
#![warn(
    missing_debug_implementations,
    missing_copy_implementations,
    rust_2018_idioms
)]

//! # Xgate-Data
//! Real-time WebSocket normalisation core for cryptocurrency exchange streams. It is:
//! * **Normalised**: every exchange feeds the same eight tables (`symbol`, `trade`, `quote_bin`,
//!   `order_book`, `order`, `position`, `wallet` & `wallet_extra`) of uniform [`Record`](event::Record)s.
//! * **Incremental**: stateful serializers only emit what changed since the last frame, tagged with
//!   the [`Action`](event::Action) a downstream consumer should apply.
//! * **Resilient**: a [`Connection`](supervisor::Connection) owns the socket, acknowledges commands,
//!   replays subscriptions after a reconnect, and stops every auxiliary task on shutdown.
//!
//! ## User API
//! - [`ConnectionConfig`](config::ConnectionConfig) selects the exchange, [`Schema`](exchange::Schema)
//!   and account of one connection.
//! - [`Router`](router::Router) classifies raw frames and fans them out to the
//!   [`Serializers`](serializer::Serializers) of every subscribed [`Table`](event::Table).
//! - [`Connection::subscribe`](supervisor::Connection::subscribe) and
//!   [`Connection::unsubscribe`](supervisor::Connection::unsubscribe) keep the
//!   [`SubscriptionRegistry`](registry::SubscriptionRegistry) and the exchange in step. While
//!   [`Connection::run`](supervisor::Connection::run) consumes the stream, a
//!   [`ConnectionHandle`](supervisor::ConnectionHandle) does the same from other tasks.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use xgate_data::{
//!     event::Table,
//!     exchange::{Connector, Schema, bitmex::Bitmex},
//!     router::Router,
//!     store::InMemoryStateStore,
//!     supervisor::{Connection, transport::connect_websocket},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     xgate_data::logging::init_logging();
//!
//!     let store = Arc::new(InMemoryStateStore::default());
//!     let router = Router::<Bitmex>::new("main", Schema::Margin, store).unwrap();
//!     let socket = connect_websocket(Bitmex::url(Schema::Margin).unwrap())
//!         .await
//!         .unwrap();
//!
//!     let mut connection = Connection::new(router, socket);
//!     connection.subscribe("desk".into(), Table::Trade, Some("XBTUSD")).await;
//!     connection.subscribe("desk".into(), Table::OrderBook, Some("XBTUSD")).await;
//!
//!     connection
//!         .run(|envelope| println!("{envelope:?}"))
//!         .await;
//! }
//! ```

/// All [`Error`](std::error::Error)s generated in Xgate-Data.
pub mod error;

/// Normalised [`Table`](event::Table)s, [`Action`](event::Action)s and the
/// [`Envelope`](event::Envelope)s emitted to consumers.
pub mod event;

/// [`Connector`](exchange::Connector) implementations for each exchange.
pub mod exchange;

/// Multi-subscriber `(table, symbol)` bookkeeping.
pub mod registry;

/// Read-only reference data (contract sizes, leverage brackets) used for enrichment.
pub mod store;

/// Stateful per-table normalisers producing incremental [`Batch`](event::Batch)es.
pub mod serializer;

/// Frame classification and per-table fan-out.
pub mod router;

/// Connection lifecycle: subscribe acknowledgements, rate limits, reconnects and shutdown.
pub mod supervisor;

/// Credential providers used to authenticate private streams.
pub mod credential;

/// Currency → USD exchange rates used to value wallets.
pub mod rates;

/// Per-connection configuration.
pub mod config;

/// Logging initialisation.
pub mod logging;
