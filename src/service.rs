//! Points service - the composite operations request handlers call
//!
//! ```text
//! ┌───────────────┐   debit    ┌────────────┐
//! │ place_order   │──────────▶│ UserLedger │  users document
//! │               │  create    ├────────────┤
//! │               │──────────▶│ OrderBook  │  orders document
//! └───────────────┘  (refund   └────────────┘
//!                     on failure)
//! ```
//!
//! Each component owns one document and its lock. Operations spanning two
//! documents are sequenced here, never nested, so no two locks are held
//! at once.

use std::sync::Arc;

use crate::broadcast::{self, BroadcastReport, BroadcastSender};
use crate::channels::{ChannelRewardTracker, MembershipOracle, RewardCredit};
use crate::config::{AppConfig, RewardConfig, StoreConfig};
use crate::core_types::{ChannelId, OrderId, Points, UserId};
use crate::error::{LedgerError, Result};
use crate::ledger::UserLedger;
use crate::models::NewOrder;
use crate::orderbook::OrderBook;
use crate::stats::{Stats, StatsAggregator};
use crate::store::RecordStore;
use crate::user_account::UserRecord;

/// A recorded order and the balance left after paying for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub balance: Points,
}

pub struct PointsService {
    ledger: Arc<UserLedger>,
    orders: Arc<OrderBook>,
    channels: ChannelRewardTracker,
    stats: StatsAggregator,
    welcome_bonus: Points,
}

impl PointsService {
    pub fn new(store: RecordStore, store_config: &StoreConfig, rewards: &RewardConfig) -> Self {
        let ledger = Arc::new(UserLedger::new(store.clone(), &store_config.users_document));
        let orders = Arc::new(OrderBook::new(store.clone(), &store_config.orders_document));
        let channels = ChannelRewardTracker::new(
            store,
            &store_config.channels_document,
            rewards.default_channel.clone(),
            ledger.clone(),
        );
        let stats = StatsAggregator::new(ledger.clone(), orders.clone());

        Self {
            ledger,
            orders,
            channels,
            stats,
            welcome_bonus: rewards.welcome_bonus,
        }
    }

    /// File-backed service using the configured data directory
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            RecordStore::file(config.store.data_path()),
            &config.store,
            &config.rewards,
        )
    }

    pub fn ledger(&self) -> &UserLedger {
        &self.ledger
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn channels(&self) -> &ChannelRewardTracker {
        &self.channels
    }

    /// First contact: create or refresh the user, then grant the one-time
    /// bonus. Returns the new balance if the bonus was granted now.
    pub async fn claim_welcome_bonus(
        &self,
        user_id: UserId,
        username: Option<&str>,
    ) -> Result<(UserRecord, Option<Points>)> {
        self.ledger.get_user(user_id, username).await?;
        let granted = self
            .ledger
            .grant_welcome_bonus(user_id, self.welcome_bonus)
            .await?;
        let user = self.ledger.get_user(user_id, None).await?;
        Ok((user, granted))
    }

    /// Debit the cost, then record the order.
    ///
    /// An insufficient balance rejects before anything is written. If the
    /// order cannot be recorded after the debit, the debit is refunded.
    ///
    /// The two steps run on their own task: dropping the returned future
    /// does not stop a placement that has started, so a debit is always
    /// followed by either an order or a refund.
    pub async fn place_order(&self, req: NewOrder) -> Result<PlacedOrder> {
        req.validate()?;
        tokio::spawn(settle_order(self.ledger.clone(), self.orders.clone(), req))
            .await
            .map_err(|e| LedgerError::Persistence(format!("order placement task failed: {}", e)))?
    }

    pub async fn credit_channel_reward(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        oracle: &dyn MembershipOracle,
    ) -> Result<RewardCredit> {
        self.channels
            .credit_channel_reward(user_id, channel_id, oracle)
            .await
    }

    pub async fn get_stats(&self) -> Stats {
        self.stats.get_stats().await
    }

    pub async fn broadcast(&self, sender: &dyn BroadcastSender, text: &str) -> BroadcastReport {
        broadcast::broadcast(&self.ledger, sender, text).await
    }
}

async fn settle_order(
    ledger: Arc<UserLedger>,
    orders: Arc<OrderBook>,
    req: NewOrder,
) -> Result<PlacedOrder> {
    let (user_id, cost) = (req.user_id, req.cost);

    let balance = match ledger.debit(user_id, cost).await {
        Ok(balance) => balance,
        Err(e) => {
            tracing::warn!(target: "ORDERS", user_id, cost, error = %e, "order rejected");
            return Err(e);
        }
    };

    match orders.create_order(req).await {
        Ok(order_id) => Ok(PlacedOrder { order_id, balance }),
        Err(e) => {
            tracing::error!(
                target: "ORDERS",
                user_id,
                cost,
                error = %e,
                "order write failed after debit, refunding"
            );
            if let Err(refund_err) = ledger.credit(user_id, cost).await {
                // Points are lost until an admin restores them
                tracing::error!(
                    target: "ORDERS",
                    user_id,
                    cost,
                    error = %refund_err,
                    "REFUND FAILED"
                );
            }
            Err(e)
        }
    }
}
