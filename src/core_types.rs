//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They give ids and amounts semantic names at API boundaries.

/// User ID - chat user identifier, assigned by the bot transport.
///
/// # Usage:
/// - Primary key for user records in the users document
/// - Persisted as a string-encoded integer map key
pub type UserId = i64;

/// Channel ID - external chat/channel identifier (may be negative).
pub type ChannelId = i64;

/// Order ID - unique and strictly increasing within the order book
pub type OrderId = u64;

/// Point amount - balances are never negative, so the type is unsigned.
pub type Points = u64;
