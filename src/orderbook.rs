//! Order Book - append-only boost orders with a monotonic id counter
//!
//! Backed by the orders document `{nextId, orders}`. Id allocation and the
//! insert happen in the same serialized mutation, so an id is never issued
//! without its record and two callers never receive the same id.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core_types::{OrderId, UserId};
use crate::error::{LedgerError, Result};
use crate::models::{NewOrder, OrderRecord, OrderStatus};
use crate::store::{Document, RecordStore};

/// The orders document.
///
/// `next_id` holds the last id handed out (0 on an empty book), so the
/// first order receives id 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    #[serde(default)]
    pub next_id: OrderId,
    #[serde(default)]
    pub orders: BTreeMap<OrderId, OrderRecord>,
}

impl OrderDocument {
    fn allocate_id(&mut self) -> Result<OrderId> {
        // A hand-edited counter must never re-issue a stored id
        let floor = self.orders.keys().next_back().copied().unwrap_or(0);
        let id = self
            .next_id
            .max(floor)
            .checked_add(1)
            .ok_or(LedgerError::Overflow)?;
        self.next_id = id;
        Ok(id)
    }
}

/// One page of orders, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPage {
    pub orders: Vec<OrderRecord>,
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
    pub total_orders: usize,
}

pub struct OrderBook {
    doc: Document<OrderDocument>,
}

impl OrderBook {
    pub fn new(store: RecordStore, name: &str) -> Self {
        Self {
            doc: Document::new(store, name, OrderDocument::default),
        }
    }

    /// Record a new `Pending` order and return its id.
    ///
    /// The caller must already have debited `req.cost`.
    pub async fn create_order(&self, req: NewOrder) -> Result<OrderId> {
        req.validate()?;
        let (user_id, cost) = (req.user_id, req.cost);

        let id = self
            .doc
            .mutate(|doc| {
                let id = doc.allocate_id()?;
                doc.orders
                    .insert(id, OrderRecord::from_request(id, req, Utc::now()));
                Ok(id)
            })
            .await?;

        tracing::info!(target: "ORDERS", order_id = id, user_id, cost, "order created");
        Ok(id)
    }

    /// All orders in id (allocation) order
    pub async fn list_orders(&self) -> Vec<OrderRecord> {
        self.doc.read().await.orders.into_values().collect()
    }

    pub async fn get_order(&self, id: OrderId) -> Option<OrderRecord> {
        self.doc.read().await.orders.remove(&id)
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Vec<OrderRecord> {
        self.doc
            .read()
            .await
            .orders
            .into_values()
            .filter(|o| o.user_id == user_id)
            .collect()
    }

    /// Last id handed out (0 if none)
    pub async fn last_id(&self) -> OrderId {
        self.doc.read().await.next_id
    }

    /// Admin status change. Only `Pending -> terminal` is allowed.
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<OrderRecord> {
        let order = self
            .doc
            .mutate(|doc| {
                let order = doc
                    .orders
                    .get_mut(&id)
                    .ok_or(LedgerError::OrderNotFound(id))?;
                order.transition(status)?;
                Ok(order.clone())
            })
            .await?;
        tracing::info!(target: "ORDERS", order_id = id, %status, "order status changed");
        Ok(order)
    }

    /// Newest-first pagination. Pages past the end come back empty.
    pub async fn recent_orders(&self, page: usize, page_size: usize) -> OrderPage {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let orders = self.list_orders().await;
        let total_orders = orders.len();
        let total_pages = total_orders.div_ceil(page_size).max(1);

        let orders = orders
            .into_iter()
            .rev()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        OrderPage {
            orders,
            page,
            total_pages,
            total_orders,
        }
    }
}
