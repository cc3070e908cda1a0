#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Xgate-Integration
//! Low-level protocol plumbing shared by the xgate exchange normalisation crates.
//!
//! Contains everything that is independent of a specific exchange data model:
//! * **Errors**: [`SocketError`](error::SocketError) for transport, serde & subscription failures.
//! * **Protocol**: WebSocket type aliases, connection helpers and request signing.
//! * **Channels**: [`Tx`](channel::Tx) abstractions used to deliver normalised output.
//! * **Rate Limits**: token-bucket [`RateLimiter`](rate_limit::RateLimiter)s keyed by a
//!   structured key rather than hidden process-wide state.

use crate::error::SocketError;

/// All [`Error`](std::error::Error)s generated in Xgate-Integration.
pub mod error;

/// WebSocket utilities and HMAC request signing.
pub mod protocol;

/// Utilities to assist deserialisation.
pub mod de;

/// Defines a trait [`Tx`](channel::Tx) abstraction over different channel kinds, as well as
/// other channel utilities.
///
/// eg/ `UnboundedTx`, `ChannelTxDroppable`, etc.
pub mod channel;

/// Priority token-bucket rate limiting keyed by a caller defined key.
pub mod rate_limit;

/// [`Validator`]s are capable of determining if their internal state is satisfactory to fulfill
/// some use case defined by the implementor.
///
/// eg/ an exchange subscription acknowledgement communicating success or failure.
pub trait Validator {
    /// Check if `Self` is valid for some use case.
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized;
}
