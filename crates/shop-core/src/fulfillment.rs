//! # Fulfillment State Machine
//!
//! Decides whether a requested status change is legal and whether it
//! restocks. The database layer applies the decision inside one transaction.
//!
//! ```text
//!   placed ─▶ accepted ─▶ processing ─┬─▶ out_for_delivery ─┐
//!     │          │            │       └─▶ ready_for_pickup ─┴─▶ fulfilled ■
//!     │          │            │
//!     └──────────┴────────────┴──────▶ cancelled ■   (restocks every line)
//!
//!   ■ terminal: no further status writes
//! ```
//!
//! Between non-terminal states staff may move freely. Only cancellation
//! has a restricted origin.

use crate::error::{CoreError, CoreResult};
use crate::types::OrderStatus;

impl OrderStatus {
    /// Fulfilled and cancelled orders accept no more status writes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }

    /// States from which a cancellation is legal.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Placed | OrderStatus::Accepted | OrderStatus::Processing
        )
    }
}

/// What applying a status change means for storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Same status on a live order. Nothing to write.
    Unchanged,
    /// Plain status write.
    Move { from: OrderStatus, to: OrderStatus },
    /// Status write plus restock of every line.
    Cancel { from: OrderStatus },
}

impl StatusChange {
    pub fn restocks(&self) -> bool {
        matches!(self, StatusChange::Cancel { .. })
    }
}

/// Validates `from → to` for the given order.
///
/// ## Example
/// ```rust
/// use shop_core::fulfillment::{plan_transition, StatusChange};
/// use shop_core::OrderStatus;
///
/// let change = plan_transition("o-1", OrderStatus::Accepted, OrderStatus::Cancelled).unwrap();
/// assert!(change.restocks());
/// assert!(plan_transition("o-1", OrderStatus::Fulfilled, OrderStatus::Placed).is_err());
/// ```
pub fn plan_transition(
    order_id: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> CoreResult<StatusChange> {
    if from.is_terminal() {
        return Err(invalid(order_id, from, to));
    }
    if from == to {
        return Ok(StatusChange::Unchanged);
    }
    if to == OrderStatus::Cancelled {
        return if from.is_cancellable() {
            Ok(StatusChange::Cancel { from })
        } else {
            Err(invalid(order_id, from, to))
        };
    }
    Ok(StatusChange::Move { from, to })
}

/// Rejects edits other than `invoice.paid` on a terminal order.
pub fn ensure_open(order_id: &str, status: OrderStatus, attempted: &str) -> CoreResult<()> {
    if status.is_terminal() {
        return Err(CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            from: status.to_string(),
            to: attempted.to_string(),
        });
    }
    Ok(())
}

fn invalid(order_id: &str, from: OrderStatus, to: OrderStatus) -> CoreError {
    CoreError::InvalidTransition {
        order_id: order_id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}
