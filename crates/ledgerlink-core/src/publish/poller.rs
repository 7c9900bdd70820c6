//! Read-your-write confirmation against the read replica

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_CONFIRM_ATTEMPTS, DEFAULT_CONFIRM_DELAY_MS};
use crate::ledger::MirrorNode;
use crate::types::AccountId;

/// Polls an account's memo on the read replica until it matches an expected value
///
/// `max_attempts` counts every read, including the first. There is no
/// sleep after the final read. Read errors count as a miss; the poller
/// never fails, it answers `false`.
#[derive(Clone)]
pub struct MirrorConfirmationPoller {
    mirror: Arc<dyn MirrorNode>,
    max_attempts: u32,
    delay: Duration,
}

impl MirrorConfirmationPoller {
    /// Poller with the default budget (5 reads, 1s apart)
    pub fn new(mirror: Arc<dyn MirrorNode>) -> Self {
        Self::with_budget(
            mirror,
            DEFAULT_CONFIRM_ATTEMPTS,
            Duration::from_millis(DEFAULT_CONFIRM_DELAY_MS),
        )
    }

    /// Poller with an explicit read budget and delay between reads
    pub fn with_budget(mirror: Arc<dyn MirrorNode>, max_attempts: u32, delay: Duration) -> Self {
        Self {
            mirror,
            max_attempts,
            delay,
        }
    }

    /// True once the account memo equals `expected`, false when the budget runs out
    pub async fn confirm(&self, account_id: &AccountId, expected: &str) -> bool {
        self.confirm_with_cancel(account_id, expected, &CancellationToken::new())
            .await
    }

    /// Like [`confirm`](Self::confirm), but gives up early (returning false) when `cancel` fires
    pub async fn confirm_with_cancel(
        &self,
        account_id: &AccountId,
        expected: &str,
        cancel: &CancellationToken,
    ) -> bool {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                debug!(%account_id, attempt, "Confirmation cancelled");
                return false;
            }

            match self.mirror.account_memo(account_id).await {
                Ok(Some(memo)) if memo == expected => {
                    debug!(%account_id, attempt, "Mutation confirmed");
                    return true;
                }
                Ok(observed) => {
                    debug!(%account_id, attempt, ?observed, "Mutation not yet visible");
                }
                Err(e) => {
                    warn!(%account_id, attempt, error = %e, "Replica read failed");
                }
            }

            if attempt == self.max_attempts {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%account_id, attempt, "Confirmation cancelled");
                    return false;
                }
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        false
    }
}
