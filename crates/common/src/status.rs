//! Order status state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of an order.
///
/// ```text
/// Open ──> Confirmed ──> Paid ──> Delivered
///   │          │
///   └──────────┴──> Canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed by checkout, awaiting confirmation.
    #[default]
    Open,

    /// Accepted by the store.
    Confirmed,

    /// Payment received.
    Paid,

    /// Canceled by the customer (terminal state).
    Canceled,

    /// Handed over to the customer (terminal state).
    Delivered,
}

/// Returned when a status name is not one of the known variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Open,
        OrderStatus::Confirmed,
        OrderStatus::Paid,
        OrderStatus::Canceled,
        OrderStatus::Delivered,
    ];

    /// Returns true if the customer may cancel the order in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Confirmed)
    }

    /// Returns true if `next` is a legal forward move from this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Open, OrderStatus::Confirmed)
                | (OrderStatus::Open, OrderStatus::Canceled)
                | (OrderStatus::Confirmed, OrderStatus::Paid)
                | (OrderStatus::Confirmed, OrderStatus::Canceled)
                | (OrderStatus::Paid, OrderStatus::Delivered)
        )
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Delivered)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "Open",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Paid => "Paid",
            OrderStatus::Canceled => "Canceled",
            OrderStatus::Delivered => "Delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_open() {
        assert_eq!(OrderStatus::default(), OrderStatus::Open);
    }

    #[test]
    fn test_only_open_and_confirmed_can_cancel() {
        assert!(OrderStatus::Open.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Paid.can_cancel());
        assert!(!OrderStatus::Canceled.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
    }

    #[test]
    fn test_forward_transitions() {
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Canceled));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Canceled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!OrderStatus::Open.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Open));
        assert!(!OrderStatus::Open.can_transition_to(OrderStatus::Open));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for terminal in [OrderStatus::Canceled, OrderStatus::Delivered] {
            assert!(terminal.is_terminal());
            for next in OrderStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_parse_and_display_agree() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert_eq!(
            "Shipped".parse::<OrderStatus>(),
            Err(UnknownStatus("Shipped".to_string()))
        );
    }

    #[test]
    fn test_serializes_as_variant_name() {
        let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(json, "\"Delivered\"");
    }
}
