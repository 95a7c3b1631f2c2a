//! Order aggregate and the domain events it raises

use crate::error::OrderError;
use chrono::{DateTime, Utc};
use outbox::{AggregateRoot, AuditInfo, DomainEvent, DomainEvents, SharedDomainEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const AGGREGATE_TYPE: &str = "order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

// ============================================================================
// Domain events
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlaced {
    pub order_id: Uuid,
    pub customer_id: String,
    pub total_cents: i64,
    pub occurred_on: DateTime<Utc>,
}

impl DomainEvent for OrderPlaced {
    fn event_type(&self) -> &'static str {
        "order.placed"
    }
    fn aggregate_type(&self) -> &'static str {
        AGGREGATE_TYPE
    }
    fn aggregate_id(&self) -> String {
        self.order_id.to_string()
    }
    fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderCancelled {
    pub order_id: Uuid,
    pub reason: String,
    pub occurred_on: DateTime<Utc>,
}

impl DomainEvent for OrderCancelled {
    fn event_type(&self) -> &'static str {
        "order.cancelled"
    }
    fn aggregate_type(&self) -> &'static str {
        AGGREGATE_TYPE
    }
    fn aggregate_id(&self) -> String {
        self.order_id.to_string()
    }
    fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }
}

// ============================================================================
// Aggregate
// ============================================================================

#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: String,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub audit: AuditInfo,
    events: DomainEvents,
}

impl Order {
    /// Create a new order and raise [`OrderPlaced`]
    pub fn place(customer_id: &str, total_cents: i64) -> Result<Self, OrderError> {
        let customer_id = customer_id.trim();
        if customer_id.is_empty() {
            return Err(OrderError::Validation("customer_id cannot be empty".to_string()));
        }
        if total_cents <= 0 {
            return Err(OrderError::Validation(format!(
                "total_cents must be positive, got {total_cents}"
            )));
        }

        let mut order = Self {
            id: Uuid::new_v4(),
            customer_id: customer_id.to_string(),
            total_cents,
            status: OrderStatus::Placed,
            cancel_reason: None,
            audit: AuditInfo::default(),
            events: DomainEvents::new(),
        };
        order.events.raise(OrderPlaced {
            order_id: order.id,
            customer_id: order.customer_id.clone(),
            total_cents,
            occurred_on: Utc::now(),
        });

        Ok(order)
    }

    /// Rebuild a stored order; no events are raised
    pub fn restore(
        id: Uuid,
        customer_id: String,
        total_cents: i64,
        status: OrderStatus,
        cancel_reason: Option<String>,
        audit: AuditInfo,
    ) -> Self {
        Self {
            id,
            customer_id,
            total_cents,
            status,
            cancel_reason,
            audit,
            events: DomainEvents::new(),
        }
    }

    /// Cancel the order and raise [`OrderCancelled`]
    pub fn cancel(&mut self, reason: &str) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled {
            return Err(OrderError::AlreadyCancelled(self.id));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrderError::Validation("cancel reason cannot be empty".to_string()));
        }

        self.status = OrderStatus::Cancelled;
        self.cancel_reason = Some(reason.to_string());
        self.events.raise(OrderCancelled {
            order_id: self.id,
            reason: reason.to_string(),
            occurred_on: Utc::now(),
        });

        Ok(())
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl AggregateRoot for Order {
    fn domain_events(&self) -> &[SharedDomainEvent] {
        self.events.as_slice()
    }

    fn clear_domain_events(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_raises_order_placed() {
        let order = Order::place(" cust-1 ", 1250).unwrap();

        assert_eq!(order.customer_id, "cust-1");
        assert_eq!(order.status, OrderStatus::Placed);

        let events = order.domain_events();
        assert_eq!(events.len(), 1);
        let placed = events[0].downcast_ref::<OrderPlaced>().unwrap();
        assert_eq!(placed.order_id, order.id);
        assert_eq!(placed.total_cents, 1250);
    }

    #[test]
    fn test_place_rejects_invalid_input() {
        assert!(matches!(Order::place("", 100), Err(OrderError::Validation(_))));
        assert!(matches!(Order::place("c", 0), Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_cancel_twice_is_rejected() {
        let mut order = Order::place("c", 100).unwrap();
        order.clear_domain_events();

        order.cancel("customer request").unwrap();
        assert_eq!(order.pending_events(), 1);
        assert!(order.domain_events()[0].downcast_ref::<OrderCancelled>().is_some());

        assert!(matches!(
            order.cancel("again"),
            Err(OrderError::AlreadyCancelled(id)) if id == order.id
        ));
        assert_eq!(order.pending_events(), 1);
    }

    #[test]
    fn test_restored_order_has_no_events() {
        let order = Order::restore(
            Uuid::new_v4(),
            "c".into(),
            10,
            OrderStatus::Placed,
            None,
            AuditInfo::default(),
        );
        assert_eq!(order.pending_events(), 0);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [OrderStatus::Placed, OrderStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
