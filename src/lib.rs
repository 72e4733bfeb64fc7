//! Boost Ledger - points and order tracking core for a chat-bot service
//!
//! Users earn points by joining channels and spend them on boost orders.
//! State lives in three JSON documents (users, orders, channels), each
//! read and written whole, each guarded by its own lock.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (UserId, OrderId, etc.)
//! - [`store`] - Durable Record Store (self-healing load, atomic save)
//! - [`user_account`] - Per-user record with enforced balance ops
//! - [`ledger`] - User Ledger over the users document
//! - [`models`] - Order record and status types
//! - [`orderbook`] - Order Book over the orders document
//! - [`channels`] - Channel catalog and reward dedup
//! - [`stats`] - Read-only rollup for admins
//! - [`broadcast`] - Message fan-out to all users
//! - [`service`] - Composite operations (order placement, rewards)
//! - [`admin`] - Admin command parsing and execution

// Core types - must be first!
pub mod core_types;
pub mod error;

// Ambient
pub mod config;
pub mod logging;

// Persistence
pub mod store;

// Ledger and orders
pub mod ledger;
pub mod models;
pub mod orderbook;
pub mod user_account;

// Rewards and reporting
pub mod broadcast;
pub mod channels;
pub mod stats;

// Entry points
pub mod admin;
pub mod service;

// Convenient re-exports at crate root
pub use core_types::{ChannelId, OrderId, Points, UserId};
pub use error::LedgerError;
pub use ledger::{LedgerDocument, UserLedger};
pub use models::{NewOrder, OrderRecord, OrderStatus};
pub use orderbook::{OrderBook, OrderDocument, OrderPage};
pub use service::{PlacedOrder, PointsService};
pub use store::{
    Document, DocumentLock, FileBackend, MemoryBackend, RecordStore, StorageBackend,
};
pub use user_account::UserRecord;

pub use channels::{
    ChannelDescriptor, ChannelRewardTracker, MembershipOracle, MembershipStatus, RewardCredit,
};
pub use stats::{Stats, StatsAggregator};
