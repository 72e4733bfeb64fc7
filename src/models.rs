// models.rs - Order record and status types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{OrderId, Points, UserId};
use crate::error::{LedgerError, Result};

/// Order status
///
/// Orders are created `Pending`. Every other state is set by an admin and
/// is terminal: once an order leaves `Pending` it never changes again.
///
/// Stored as the lowercase name. Loading accepts every spelling
/// [`FromStr`] does, so a hand-edited document stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        *self == OrderStatus::Pending && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" | "done" => Ok(OrderStatus::Completed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(LedgerError::InvalidInput(format!(
                "unknown order status: {}",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================
// NEW ORDER (request, before an id is allocated)
// ============================================================

/// A boost order as requested by a user, before it is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    /// Category tag, e.g. "views" or "reactions"
    pub service: String,
    /// Free-text destination, usually a post link
    pub target: String,
    pub quantity: u64,
    pub cost: Points,
}

impl NewOrder {
    pub fn new(
        user_id: UserId,
        service: impl Into<String>,
        target: impl Into<String>,
        quantity: u64,
        cost: Points,
    ) -> Self {
        Self {
            user_id,
            service: service.into(),
            target: target.into(),
            quantity,
            cost,
        }
    }

    /// # Errors
    /// - `InvalidAmount` if `quantity == 0`
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }
}

// ============================================================
// ORDER RECORD (persisted)
// ============================================================

/// A recorded order. `cost` has already been debited from the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub service: String,
    pub target: String,
    pub quantity: u64,
    pub cost: Points,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    pub fn from_request(id: OrderId, req: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: req.user_id,
            service: req.service,
            target: req.target,
            quantity: req.quantity,
            cost: req.cost,
            status: OrderStatus::Pending,
            created_at: Some(created_at),
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// # Errors
    /// - `InvalidStatusTransition` unless `Pending -> terminal`
    pub fn transition(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_order() -> OrderRecord {
        OrderRecord::from_request(1, NewOrder::new(7, "x", "y", 100, 10), Utc::now())
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }

    #[test]
    fn test_valid_transitions() {
        for next in [
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ] {
            let mut order = pending_order();
            order.transition(next).unwrap();
            assert_eq!(order.status, next);
        }
    }

    #[test]
    fn test_terminal_is_final() {
        let mut order = pending_order();
        order.transition(OrderStatus::Completed).unwrap();

        assert_eq!(
            order.transition(OrderStatus::Cancelled),
            Err(LedgerError::InvalidStatusTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Cancelled,
            })
        );
        assert!(order.transition(OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_pending_to_pending_rejected() {
        let mut order = pending_order();
        assert!(order.transition(OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert_eq!("Completed".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_load_accepts_parse_spellings() {
        for (raw, status) in [
            ("\"canceled\"", OrderStatus::Cancelled),
            ("\"done\"", OrderStatus::Completed),
            ("\"Failed\"", OrderStatus::Failed),
            ("\"pending\"", OrderStatus::Pending),
        ] {
            assert_eq!(serde_json::from_str::<OrderStatus>(raw).unwrap(), status);
        }
        assert!(serde_json::from_str::<OrderStatus>("\"shipped\"").is_err());
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(
            NewOrder::new(1, "x", "y", 0, 10).validate(),
            Err(LedgerError::InvalidAmount)
        );
        assert!(NewOrder::new(1, "x", "y", 1, 0).validate().is_ok());
    }

    #[test]
    fn test_stored_layout() {
        let mut order = pending_order();
        order.created_at = None;
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            serde_json::json!({
                "id": 1,
                "userId": 7,
                "service": "x",
                "target": "y",
                "quantity": 100,
                "cost": 10,
                "status": "pending"
            })
        );
    }
}
