//! Stats Aggregator - read-only rollup for admin tooling
//!
//! Reads the ledger and the order book one after the other. The two
//! snapshots are each consistent, but not with each other.

use serde::Serialize;
use std::sync::Arc;

use crate::ledger::UserLedger;
use crate::models::OrderRecord;
use crate::orderbook::OrderBook;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub user_count: usize,
    pub order_count: usize,
    pub pending_order_count: usize,
    pub orders: Vec<OrderRecord>,
}

pub struct StatsAggregator {
    ledger: Arc<UserLedger>,
    orders: Arc<OrderBook>,
}

impl StatsAggregator {
    pub fn new(ledger: Arc<UserLedger>, orders: Arc<OrderBook>) -> Self {
        Self { ledger, orders }
    }

    pub async fn get_stats(&self) -> Stats {
        let user_count = self.ledger.list_all().await.len();
        let orders = self.orders.list_orders().await;
        let pending_order_count = orders.iter().filter(|o| o.is_pending()).count();

        Stats {
            user_count,
            order_count: orders.len(),
            pending_order_count,
            orders,
        }
    }
}
