//! Channel Reward Tracker
//!
//! Catalog of reward-eligible channels plus the per-user dedup guard kept
//! in the user ledger. All catalog writes go through [`ChannelRewardTracker`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core_types::{ChannelId, Points, UserId};
use crate::error::{LedgerError, Result};
use crate::ledger::UserLedger;
use crate::store::{Document, RecordStore};

/// Catalog entry. `id` is unique within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub title: String,
    pub reward: Points,
    pub link: String,
}

/// Membership as reported by the chat transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Member,
    Administrator,
    Owner,
    NotMember,
    Unknown,
}

impl MembershipStatus {
    /// Only confirmed membership earns a reward
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            MembershipStatus::Member | MembershipStatus::Administrator | MembershipStatus::Owner
        )
    }
}

/// Live membership lookup, supplied by the bot transport.
///
/// An `Err` means the check itself failed (network, API error) and is
/// distinct from a definite `NotMember`.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn membership(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> anyhow::Result<MembershipStatus>;
}

/// Result of a successful reward credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardCredit {
    pub channel_id: ChannelId,
    pub reward: Points,
    pub balance: Points,
}

pub struct ChannelRewardTracker {
    catalog: Document<Vec<ChannelDescriptor>>,
    ledger: Arc<UserLedger>,
}

impl ChannelRewardTracker {
    pub fn new(
        store: RecordStore,
        name: &str,
        default_channel: ChannelDescriptor,
        ledger: Arc<UserLedger>,
    ) -> Self {
        Self {
            catalog: Document::new(store, name, move || vec![default_channel.clone()]),
            ledger,
        }
    }

    /// The catalog; seeded with the default entry on first use.
    pub async fn list_channels(&self) -> Vec<ChannelDescriptor> {
        self.catalog.read().await
    }

    pub async fn get_channel(&self, channel_id: ChannelId) -> Result<ChannelDescriptor> {
        self.list_channels()
            .await
            .into_iter()
            .find(|c| c.id == channel_id)
            .ok_or(LedgerError::ChannelNotFound(channel_id))
    }

    pub async fn has_been_rewarded(&self, user_id: UserId, channel_id: ChannelId) -> bool {
        self.ledger.has_joined(user_id, channel_id).await
    }

    /// Idempotent; upserts the user.
    pub async fn mark_rewarded(&self, user_id: UserId, channel_id: ChannelId) -> Result<()> {
        self.ledger.mark_channel(user_id, channel_id).await?;
        Ok(())
    }

    /// Admin catalog edit.
    ///
    /// # Errors
    /// - `ChannelNotFound` if no entry has `channel_id` (catalog unchanged)
    pub async fn set_reward(
        &self,
        channel_id: ChannelId,
        reward: Points,
    ) -> Result<ChannelDescriptor> {
        let channel = self
            .catalog
            .mutate(|catalog| {
                let channel = catalog
                    .iter_mut()
                    .find(|c| c.id == channel_id)
                    .ok_or(LedgerError::ChannelNotFound(channel_id))?;
                channel.reward = reward;
                Ok(channel.clone())
            })
            .await?;
        tracing::info!(target: "CHANNELS", channel_id, reward, "channel reward updated");
        Ok(channel)
    }

    /// Check, verify, then credit-and-mark in a single ledger mutation.
    ///
    /// 1. Reject early if already rewarded
    /// 2. Ask the oracle (no lock held while waiting on the transport)
    /// 3. Credit the catalog reward and mark the channel atomically; the
    ///    dedup check is repeated inside the mutation, so two concurrent
    ///    claims credit at most once
    ///
    /// # Errors
    /// - `ChannelNotFound`, `AlreadyRewarded`, `NotAMember`
    /// - `MembershipCheck` if the oracle failed (nothing credited or marked)
    pub async fn credit_channel_reward(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        oracle: &dyn MembershipOracle,
    ) -> Result<RewardCredit> {
        let channel = self.get_channel(channel_id).await?;

        if self.has_been_rewarded(user_id, channel_id).await {
            return Err(LedgerError::AlreadyRewarded {
                user_id,
                channel_id,
            });
        }

        let status = oracle
            .membership(channel_id, user_id)
            .await
            .map_err(|e| {
                tracing::warn!(
                    target: "CHANNELS",
                    user_id,
                    channel_id,
                    error = %e,
                    "membership check failed"
                );
                LedgerError::MembershipCheck(e.to_string())
            })?;

        if !status.is_member() {
            return Err(LedgerError::NotAMember {
                user_id,
                channel_id,
            });
        }

        let balance = self
            .ledger
            .credit_channel(user_id, channel_id, channel.reward)
            .await?;

        tracing::info!(
            target: "CHANNELS",
            user_id,
            channel_id,
            reward = channel.reward,
            balance,
            "channel reward credited"
        );
        Ok(RewardCredit {
            channel_id,
            reward: channel.reward,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Oracle with fixed answers; unknown pairs fail like a transport error
    #[derive(Default)]
    struct FixedOracle {
        answers: HashMap<(ChannelId, UserId), MembershipStatus>,
        calls: AtomicUsize,
    }

    impl FixedOracle {
        fn with(channel_id: ChannelId, user_id: UserId, status: MembershipStatus) -> Self {
            let mut oracle = Self::default();
            oracle.answers.insert((channel_id, user_id), status);
            oracle
        }
    }

    #[async_trait]
    impl MembershipOracle for FixedOracle {
        async fn membership(
            &self,
            channel_id: ChannelId,
            user_id: UserId,
        ) -> anyhow::Result<MembershipStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(&(channel_id, user_id))
                .copied()
                .ok_or_else(|| anyhow::anyhow!("getChatMember timed out"))
        }
    }

    fn default_channel() -> ChannelDescriptor {
        ChannelDescriptor {
            id: -100,
            title: "News".to_string(),
            reward: 5,
            link: "https://t.me/news".to_string(),
        }
    }

    fn tracker() -> (Arc<MemoryBackend>, Arc<UserLedger>, ChannelRewardTracker) {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::new(backend.clone());
        let ledger = Arc::new(UserLedger::new(store.clone(), "users"));
        let tracker =
            ChannelRewardTracker::new(store, "channels", default_channel(), ledger.clone());
        (backend, ledger, tracker)
    }

    #[tokio::test]
    async fn test_catalog_seeded_on_first_use() {
        let (backend, _ledger, tracker) = tracker();
        assert!(backend.raw("channels").await.is_none());

        assert_eq!(tracker.list_channels().await, vec![default_channel()]);
        let raw: serde_json::Value =
            serde_json::from_slice(&backend.raw("channels").await.unwrap()).unwrap();
        assert_eq!(raw[0]["id"], -100);
        assert_eq!(raw[0]["reward"], 5);
    }

    #[tokio::test]
    async fn test_set_reward() {
        let (_backend, _ledger, tracker) = tracker();
        let updated = tracker.set_reward(-100, 12).await.unwrap();
        assert_eq!(updated.reward, 12);
        assert_eq!(tracker.get_channel(-100).await.unwrap().reward, 12);

        assert_eq!(
            tracker.set_reward(-999, 1).await,
            Err(LedgerError::ChannelNotFound(-999))
        );
        assert_eq!(tracker.list_channels().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_rewarded_idempotent() {
        let (_backend, _ledger, tracker) = tracker();
        assert!(!tracker.has_been_rewarded(1, -100).await);
        tracker.mark_rewarded(1, -100).await.unwrap();
        assert!(tracker.has_been_rewarded(1, -100).await);
        tracker.mark_rewarded(1, -100).await.unwrap();
        tracker.mark_rewarded(1, -100).await.unwrap();
        assert!(tracker.has_been_rewarded(1, -100).await);
    }

    #[tokio::test]
    async fn test_credit_reward_for_member() {
        let (_backend, ledger, tracker) = tracker();
        let oracle = FixedOracle::with(-100, 1, MembershipStatus::Administrator);

        let credit = tracker
            .credit_channel_reward(1, -100, &oracle)
            .await
            .unwrap();
        assert_eq!(
            credit,
            RewardCredit {
                channel_id: -100,
                reward: 5,
                balance: 5
            }
        );
        assert!(tracker.has_been_rewarded(1, -100).await);

        // second claim is rejected before the oracle is consulted
        assert!(matches!(
            tracker.credit_channel_reward(1, -100, &oracle).await,
            Err(LedgerError::AlreadyRewarded { .. })
        ));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.find_user(1).await.unwrap().points(), 5);
    }

    #[tokio::test]
    async fn test_not_a_member_is_not_credited() {
        let (_backend, ledger, tracker) = tracker();
        let oracle = FixedOracle::with(-100, 2, MembershipStatus::NotMember);

        assert_eq!(
            tracker.credit_channel_reward(2, -100, &oracle).await,
            Err(LedgerError::NotAMember {
                user_id: 2,
                channel_id: -100
            })
        );
        assert!(!tracker.has_been_rewarded(2, -100).await);
        assert!(ledger.find_user(2).await.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_transient() {
        let (_backend, ledger, tracker) = tracker();
        let oracle = FixedOracle::default();

        let err = tracker
            .credit_channel_reward(3, -100, &oracle)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MembershipCheck(_)));
        assert!(err.is_transient());
        assert!(!tracker.has_been_rewarded(3, -100).await);
        assert!(ledger.find_user(3).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let (_backend, _ledger, tracker) = tracker();
        let oracle = FixedOracle::with(-5, 1, MembershipStatus::Member);
        assert_eq!(
            tracker.credit_channel_reward(1, -5, &oracle).await,
            Err(LedgerError::ChannelNotFound(-5))
        );
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_claims_credit_once() {
        let (_backend, ledger, tracker) = tracker();
        let tracker = Arc::new(tracker);
        let oracle = Arc::new(FixedOracle::with(-100, 4, MembershipStatus::Member));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let tracker = tracker.clone();
                let oracle = oracle.clone();
                tokio::spawn(async move {
                    tracker
                        .credit_channel_reward(4, -100, oracle.as_ref())
                        .await
                })
            })
            .collect();

        let successes = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(ledger.find_user(4).await.unwrap().points(), 5);
    }
}
