//! Admin broadcast over every known user

use async_trait::async_trait;

use crate::core_types::UserId;
use crate::ledger::UserLedger;

/// Message delivery, supplied by the bot transport
#[async_trait]
pub trait BroadcastSender: Send + Sync {
    async fn send(&self, user_id: UserId, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// One delivery attempt per user in the ledger. Failures are counted, not raised.
pub async fn broadcast(
    ledger: &UserLedger,
    sender: &dyn BroadcastSender,
    text: &str,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for user_id in ledger.list_all().await.into_keys() {
        match sender.send(user_id, text).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::debug!(target: "ADMIN", user_id, error = %e, "broadcast delivery failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        target: "ADMIN",
        delivered = report.delivered,
        failed = report.failed,
        "broadcast finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBackend, RecordStore};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Records deliveries; users in `blocked` fail like a bot-blocked error
    struct RecordingSender {
        blocked: Vec<UserId>,
        sent: Mutex<Vec<(UserId, String)>>,
    }

    #[async_trait]
    impl BroadcastSender for RecordingSender {
        async fn send(&self, user_id: UserId, text: &str) -> anyhow::Result<()> {
            if self.blocked.contains(&user_id) {
                anyhow::bail!("Forbidden: bot was blocked by the user");
            }
            self.sent.lock().await.push((user_id, text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_broadcast_counts_failures() {
        let ledger = UserLedger::new(RecordStore::new(Arc::new(MemoryBackend::new())), "users");
        for id in [1, 2, 3] {
            ledger.get_user(id, None).await.unwrap();
        }

        let sender = RecordingSender {
            blocked: vec![2],
            sent: Mutex::new(Vec::new()),
        };
        let report = broadcast(&ledger, &sender, "Привет!").await;

        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                failed: 1
            }
        );
        let sent = sender.sent.lock().await;
        assert_eq!(
            *sent,
            vec![(1, "Привет!".to_string()), (3, "Привет!".to_string())]
        );
    }
}
