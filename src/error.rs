//! Ledger Error Types
//!
//! Every rejection a core operation can produce. Corrupt or missing
//! persisted state is NOT an error: the store recovers it locally.

use thiserror::Error;

use crate::core_types::{ChannelId, OrderId, Points, UserId};
use crate::models::OrderStatus;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Input Errors ===
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    // === Balance Errors ===
    #[error("Insufficient balance: required {required}, available {available} (short by {})", shortfall(.required, .available))]
    InsufficientBalance { required: Points, available: Points },

    #[error("Balance would become negative: current {current}, delta {delta}")]
    NegativeBalance { current: Points, delta: i64 },

    #[error("Amount would cause overflow")]
    Overflow,

    // === Lookup Errors ===
    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    // === Reward Errors ===
    #[error("User {user_id} already rewarded for channel {channel_id}")]
    AlreadyRewarded {
        user_id: UserId,
        channel_id: ChannelId,
    },

    #[error("User {user_id} is not a member of channel {channel_id}")]
    NotAMember {
        user_id: UserId,
        channel_id: ChannelId,
    },

    // === System Errors ===
    #[error("Membership check failed: {0}")]
    MembershipCheck(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

fn shortfall(required: &Points, available: &Points) -> Points {
    required.saturating_sub(*available)
}

impl LedgerError {
    /// Stable error code for admin replies and logs
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::NegativeBalance { .. } => "NEGATIVE_BALANCE",
            LedgerError::Overflow => "OVERFLOW",
            LedgerError::ChannelNotFound(_) => "CHANNEL_NOT_FOUND",
            LedgerError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            LedgerError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            LedgerError::AlreadyRewarded { .. } => "ALREADY_REWARDED",
            LedgerError::NotAMember { .. } => "NOT_A_MEMBER",
            LedgerError::MembershipCheck(_) => "MEMBERSHIP_CHECK_FAILED",
            LedgerError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Transient failures may succeed on retry; everything else is a rejection.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::MembershipCheck(_) | LedgerError::Persistence(_)
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Persistence(e.to_string())
    }
}
