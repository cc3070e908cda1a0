use crate::error::DataError;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Reconnection backoff policy used by [`connect_with_backoff`].
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Constructor,
)]
pub struct ReconnectionBackoffPolicy {
    /// Initial backoff millisecond duration after the first failed connection attempt.
    ///
    /// This value then scales with the `backoff_multiplier` in the case of repeated failed
    /// attempts.
    pub backoff_ms_initial: u64,

    /// Scaling factor for the backoff duration in the case of repeated failed attempts.
    pub backoff_multiplier: u8,

    /// Maximum possible backoff duration between attempts.
    pub backoff_ms_max: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub(crate) struct ReconnectionState {
    policy: ReconnectionBackoffPolicy,
    backoff_ms_current: u64,
}

impl From<ReconnectionBackoffPolicy> for ReconnectionState {
    fn from(policy: ReconnectionBackoffPolicy) -> Self {
        Self {
            backoff_ms_current: policy.backoff_ms_initial,
            policy,
        }
    }
}

impl ReconnectionState {
    pub(crate) fn reset_backoff(&mut self) {
        self.backoff_ms_current = self.policy.backoff_ms_initial;
    }

    pub(crate) fn multiply_backoff(&mut self) {
        let next = self
            .backoff_ms_current
            .saturating_mul(self.policy.backoff_multiplier as u64);
        self.backoff_ms_current = std::cmp::min(next, self.policy.backoff_ms_max);
    }

    pub(crate) fn backoff_ms(&self) -> u64 {
        self.backoff_ms_current
    }

    fn generate_sleep_future(&self) -> tokio::time::Sleep {
        tokio::time::sleep(std::time::Duration::from_millis(self.backoff_ms_current))
    }
}

/// Repeatedly run the `connect` closure until it succeeds, sleeping between failed attempts
/// as dictated by the [`ReconnectionBackoffPolicy`].
///
/// Returns `None` if the [`CancellationToken`] is cancelled first.
pub async fn connect_with_backoff<FnConnect, ConnectFut, T>(
    policy: ReconnectionBackoffPolicy,
    cancel: &CancellationToken,
    mut connect: FnConnect,
) -> Option<T>
where
    FnConnect: FnMut() -> ConnectFut,
    ConnectFut: Future<Output = Result<T, DataError>>,
{
    let mut state = ReconnectionState::from(policy);

    for attempt in 0usize.. {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = connect() => result,
        };

        match result {
            Ok(connected) => {
                info!(attempt, "successfully established connection");
                state.reset_backoff();
                return Some(connected);
            }
            Err(error) => {
                warn!(
                    attempt,
                    backoff_ms = state.backoff_ms(),
                    %error,
                    "failed to establish connection"
                );

                let sleep = state.generate_sleep_future();
                state.multiply_backoff();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return None,
                    _ = sleep => {}
                }
            }
        }
    }

    None
}
