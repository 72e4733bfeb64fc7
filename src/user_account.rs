use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core_types::{ChannelId, Points};
use crate::error::{LedgerError, Result};

/// One user's persisted state in the users document.
///
/// # Invariants (enforced by private fields):
/// 1. `points` is never negative (unsigned, all debits checked)
/// 2. a channel appears in `joined_channels` at most once (set)
/// 3. `welcome_bonus_given` only ever goes false -> true
///
/// Serialized field names are camelCase to match the stored layout:
/// `{username, points, joinedChannels, welcomeBonusGiven}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    points: Points,
    #[serde(default)]
    joined_channels: BTreeSet<ChannelId>,
    #[serde(default)]
    welcome_bonus_given: bool,
}

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================
    // READ-ONLY GETTERS
    // ============================================================

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[inline(always)]
    pub const fn points(&self) -> Points {
        self.points
    }

    pub fn joined_channels(&self) -> &BTreeSet<ChannelId> {
        &self.joined_channels
    }

    pub fn has_joined(&self, channel_id: ChannelId) -> bool {
        self.joined_channels.contains(&channel_id)
    }

    #[inline(always)]
    pub const fn welcome_bonus_given(&self) -> bool {
        self.welcome_bonus_given
    }

    // ============================================================
    // VALIDATED MUTATIONS
    // ============================================================

    /// Record the last-seen display name.
    ///
    /// Empty names are ignored. Returns true if the stored name changed.
    pub fn update_username(&mut self, username: Option<&str>) -> bool {
        match username {
            Some(name) if !name.is_empty() && self.username.as_deref() != Some(name) => {
                self.username = Some(name.to_string());
                true
            }
            _ => false,
        }
    }

    /// Add points.
    ///
    /// # Errors
    /// - `Overflow` if the balance would exceed `u64::MAX`
    pub fn credit(&mut self, amount: Points) -> Result<Points> {
        self.points = self
            .points
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(self.points)
    }

    /// Remove points.
    ///
    /// # Errors
    /// - `InsufficientBalance` if `amount > points` (balance unchanged)
    pub fn debit(&mut self, amount: Points) -> Result<Points> {
        if self.points < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: self.points,
            });
        }
        self.points -= amount;
        Ok(self.points)
    }

    /// Apply a signed adjustment.
    ///
    /// # Errors
    /// - `NegativeBalance` if the result would drop below zero
    /// - `Overflow` on positive overflow
    pub fn apply_delta(&mut self, delta: i64) -> Result<Points> {
        if delta >= 0 {
            return self.credit(delta.unsigned_abs());
        }
        let amount = delta.unsigned_abs();
        if self.points < amount {
            return Err(LedgerError::NegativeBalance {
                current: self.points,
                delta,
            });
        }
        self.points -= amount;
        Ok(self.points)
    }

    /// Overwrite the balance unconditionally
    pub fn set_points(&mut self, amount: Points) -> Points {
        self.points = amount;
        self.points
    }

    /// Add a channel to the dedup set. Returns false if it was already there.
    pub fn mark_channel(&mut self, channel_id: ChannelId) -> bool {
        self.joined_channels.insert(channel_id)
    }

    /// Flip the welcome-bonus guard. Returns false if it was already set.
    pub fn mark_welcome_bonus(&mut self) -> bool {
        if self.welcome_bonus_given {
            return false;
        }
        self.welcome_bonus_given = true;
        true
    }
}
