//! Which status overwrites an admin may perform.

use common::OrderStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rule set applied by [`OrderService::update_status`](super::OrderService::update_status).
///
/// `Permissive` accepts any status to any status, so an admin can correct a
/// mistake (Delivered back to Open, for instance). `Strict` only accepts the
/// forward moves of the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    #[default]
    Permissive,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status policy: {0} (expected permissive or strict)")]
pub struct UnknownPolicy(pub String);

impl StatusPolicy {
    pub fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            StatusPolicy::Permissive => true,
            StatusPolicy::Strict => from.can_transition_to(to),
        }
    }
}

impl std::str::FromStr for StatusPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(StatusPolicy::Permissive),
            "strict" => Ok(StatusPolicy::Strict),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_accepts_backwards_moves() {
        assert!(StatusPolicy::Permissive.allows(OrderStatus::Delivered, OrderStatus::Open));
        assert!(StatusPolicy::Permissive.allows(OrderStatus::Canceled, OrderStatus::Paid));
    }

    #[test]
    fn strict_follows_the_lifecycle() {
        let strict = StatusPolicy::Strict;
        assert!(strict.allows(OrderStatus::Open, OrderStatus::Confirmed));
        assert!(strict.allows(OrderStatus::Paid, OrderStatus::Delivered));
        assert!(!strict.allows(OrderStatus::Open, OrderStatus::Paid));
        assert!(!strict.allows(OrderStatus::Delivered, OrderStatus::Open));
        assert!(!strict.allows(OrderStatus::Canceled, OrderStatus::Open));
    }

    #[test]
    fn parse_policy_names() {
        assert_eq!("strict".parse(), Ok(StatusPolicy::Strict));
        assert_eq!(" Permissive ".parse(), Ok(StatusPolicy::Permissive));
        assert!("lenient".parse::<StatusPolicy>().is_err());
    }
}
