use crate::{
    event::Table,
    exchange::{ExchangeId, Schema},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xgate_integration::error::SocketError;

/// All errors generated in `xgate-data`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("failed to parse transport frame: {0}")]
    Parse(String),

    #[error("serializer fault for table {table}: {reason}")]
    Serializer { table: Table, reason: String },

    #[error("unsupported for exchange: {exchange}, schema: {schema}, table: {table}")]
    Unsupported {
        exchange: ExchangeId,
        schema: Schema,
        table: Table,
    },

    #[error("subscription rejected by exchange: {0}")]
    SubscribeRejected(String),

    #[error("subscription acknowledgement timeout reached after {0}ms")]
    SubscribeTimeout(u64),

    #[error("table {0} requires an authenticated connection")]
    NotAuthenticated(Table),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("connection cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("credential unavailable: {0}")]
    Credential(String),

    #[error("Envelope receiver dropped")]
    ReceiverDropped,
}

impl DataError {
    /// Determine if an error requires a [`Connection`](crate::supervisor::Connection) to
    /// reconnect before it can be used again.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            DataError::Socket(_) => true,
            _ => false,
        }
    }

    pub fn serializer<Reason>(table: Table, reason: Reason) -> Self
    where
        Reason: std::fmt::Display,
    {
        Self::Serializer {
            table,
            reason: reason.to_string(),
        }
    }
}

impl From<SocketError> for DataError {
    fn from(value: SocketError) -> Self {
        match value {
            SocketError::Subscribe(reason) => Self::SubscribeRejected(reason),
            SocketError::SubscribeTimeout(timeout) => {
                Self::SubscribeTimeout(timeout.as_millis() as u64)
            }
            SocketError::Deserialise { error, payload } => {
                Self::Parse(format!("{error} for payload: {payload}"))
            }
            SocketError::UrlParse(error) => Self::Config(error.to_string()),
            SocketError::Signature(reason) => Self::Credential(reason),
            other if other.is_disconnect() => Self::Socket(other.to_string()),
            other => Self::Parse(other.to_string()),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for DataError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ReceiverDropped
    }
}

impl From<serde_json::Error> for DataError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_terminal() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: is terminal w/ DataError::Socket
                input: DataError::from(SocketError::Sink),
                expected: true,
            },
            TestCase {
                // TC1: is not terminal w/ rejected subscription
                input: DataError::from(SocketError::Subscribe("rejected".to_string())),
                expected: false,
            },
            TestCase {
                // TC2: is not terminal w/ DataError::Parse
                input: DataError::Parse("expected value at line 1 column 1".to_string()),
                expected: false,
            },
            TestCase {
                // TC3: is not terminal w/ DataError::SubscribeTimeout
                input: DataError::SubscribeTimeout(10_000),
                expected: false,
            },
            TestCase {
                // TC4: is not terminal w/ DataError::Cancelled
                input: DataError::Cancelled,
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_socket_error_mapping() {
        assert_eq!(
            DataError::from(SocketError::SubscribeTimeout(std::time::Duration::from_secs(10))),
            DataError::SubscribeTimeout(10_000)
        );
        assert_eq!(
            DataError::from(SocketError::Subscribe("Unknown table: foo".to_string())),
            DataError::SubscribeRejected("Unknown table: foo".to_string())
        );
        assert_eq!(
            DataError::from(SocketError::Signature("empty key".to_string())),
            DataError::Credential("empty key".to_string())
        );
        assert!(matches!(
            DataError::from(SocketError::Exchange("non UTF-8 binary payload".to_string())),
            DataError::Parse(_)
        ));
        assert!(DataError::from(SocketError::Terminated("CloseFrame".to_string())).is_terminal());
    }
}
