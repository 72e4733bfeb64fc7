//! User Ledger - per-user balances, reward history, welcome-bonus guard
//!
//! Backed by the users document (`user id -> UserRecord`). Every mutating
//! call is one serialized load-mutate-save of the whole document; users
//! are created lazily through [`get_or_create`] and never deleted.

use std::collections::BTreeMap;

use crate::core_types::{ChannelId, Points, UserId};
use crate::error::{LedgerError, Result};
use crate::store::{Document, RecordStore};
use crate::user_account::UserRecord;

/// The users document. Integer keys are stored as JSON strings.
pub type LedgerDocument = BTreeMap<UserId, UserRecord>;

/// The one path by which user records come into existence.
fn get_or_create(doc: &mut LedgerDocument, user_id: UserId) -> &mut UserRecord {
    doc.entry(user_id).or_default()
}

pub struct UserLedger {
    doc: Document<LedgerDocument>,
}

impl UserLedger {
    pub fn new(store: RecordStore, name: &str) -> Self {
        Self {
            doc: Document::new(store, name, LedgerDocument::new),
        }
    }

    /// Fetch a user, creating the zero-balance record on first reference.
    ///
    /// A non-empty `username` that differs from the stored one replaces it.
    /// The document is written only if the record was created or renamed.
    pub async fn get_user(&self, user_id: UserId, username: Option<&str>) -> Result<UserRecord> {
        self.doc
            .mutate(|doc| {
                let user = get_or_create(doc, user_id);
                user.update_username(username);
                Ok(user.clone())
            })
            .await
    }

    /// Read-only lookup; never creates.
    pub async fn find_user(&self, user_id: UserId) -> Option<UserRecord> {
        self.doc.read().await.remove(&user_id)
    }

    /// Signed balance adjustment. Rejects results below zero.
    pub async fn add_points(&self, user_id: UserId, delta: i64) -> Result<Points> {
        let balance = self
            .doc
            .mutate(|doc| get_or_create(doc, user_id).apply_delta(delta))
            .await?;
        tracing::info!(target: "LEDGER", user_id, delta, balance, "points adjusted");
        Ok(balance)
    }

    pub async fn set_points(&self, user_id: UserId, amount: Points) -> Result<Points> {
        let balance = self
            .doc
            .mutate(|doc| Ok(get_or_create(doc, user_id).set_points(amount)))
            .await?;
        tracing::info!(target: "LEDGER", user_id, balance, "points set");
        Ok(balance)
    }

    /// Remove `amount` or fail with the shortfall; nothing changes on failure.
    pub async fn debit(&self, user_id: UserId, amount: Points) -> Result<Points> {
        self.doc
            .mutate(|doc| get_or_create(doc, user_id).debit(amount))
            .await
    }

    pub async fn credit(&self, user_id: UserId, amount: Points) -> Result<Points> {
        self.doc
            .mutate(|doc| get_or_create(doc, user_id).credit(amount))
            .await
    }

    /// Returns true only for the call that flipped the flag.
    pub async fn mark_welcome_bonus_given(&self, user_id: UserId) -> Result<bool> {
        self.doc
            .mutate(|doc| Ok(get_or_create(doc, user_id).mark_welcome_bonus()))
            .await
    }

    /// Credit `bonus` and set the guard in one mutation.
    ///
    /// Returns the new balance, or `None` if the bonus was already given.
    pub async fn grant_welcome_bonus(
        &self,
        user_id: UserId,
        bonus: Points,
    ) -> Result<Option<Points>> {
        let granted = self
            .doc
            .mutate(|doc| {
                let user = get_or_create(doc, user_id);
                if user.welcome_bonus_given() {
                    return Ok(None);
                }
                let balance = user.credit(bonus)?;
                user.mark_welcome_bonus();
                Ok(Some(balance))
            })
            .await?;
        if let Some(balance) = granted {
            tracing::info!(target: "LEDGER", user_id, bonus, balance, "welcome bonus granted");
        }
        Ok(granted)
    }

    /// Dedup check. Unknown users have joined nothing.
    pub async fn has_joined(&self, user_id: UserId, channel_id: ChannelId) -> bool {
        self.doc
            .read()
            .await
            .get(&user_id)
            .is_some_and(|user| user.has_joined(channel_id))
    }

    /// Idempotent. Returns false if the channel was already marked.
    pub async fn mark_channel(&self, user_id: UserId, channel_id: ChannelId) -> Result<bool> {
        self.doc
            .mutate(|doc| Ok(get_or_create(doc, user_id).mark_channel(channel_id)))
            .await
    }

    /// Credit a channel reward and mark the channel in one mutation.
    ///
    /// # Errors
    /// - `AlreadyRewarded` if the channel is already in the user's set
    pub async fn credit_channel(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        reward: Points,
    ) -> Result<Points> {
        self.doc
            .mutate(|doc| {
                let user = get_or_create(doc, user_id);
                if user.has_joined(channel_id) {
                    return Err(LedgerError::AlreadyRewarded {
                        user_id,
                        channel_id,
                    });
                }
                let balance = user.credit(reward)?;
                user.mark_channel(channel_id);
                Ok(balance)
            })
            .await
    }

    /// Full snapshot, for broadcast and stats
    pub async fn list_all(&self) -> LedgerDocument {
        self.doc.read().await
    }
}
