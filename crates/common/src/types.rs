use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a newtype over the `BIGSERIAL` primary key of a table.
///
/// Keeping one type per table stops a cart item id from being passed
/// where a product id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database id.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database id.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a registered user.
    UserId
);
row_id!(
    /// Identifier of a catalog product.
    ProductId
);
row_id!(
    /// Identifier of a product category.
    CategoryId
);
row_id!(
    /// Identifier of a product brand.
    BrandId
);
row_id!(
    /// Identifier of a user's cart.
    CartId
);
row_id!(
    /// Identifier of a single cart line.
    CartItemId
);
row_id!(
    /// Internal sequential identifier of an order. Never exposed as a share token.
    OrderId
);
row_id!(
    /// Identifier of an order line.
    OrderItemId
);
row_id!(
    /// Identifier of a product review.
    ReviewId
);
row_id!(
    /// Identifier of a user's wishlist.
    WishlistId
);
row_id!(
    /// Identifier of a wishlist entry.
    WishlistItemId
);

/// Opaque public identifier of an order.
///
/// Random and unguessable; it is the only order identifier meant to be
/// shared outside the owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderUuid(Uuid);

impl OrderUuid {
    /// Creates a new random order uuid.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an order uuid from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<OrderUuid> for Uuid {
    fn from(id: OrderUuid) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_uuid_new_creates_unique_ids() {
        let id1 = OrderUuid::new();
        let id2 = OrderUuid::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn order_uuid_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = OrderUuid::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn row_ids_serialize_as_bare_numbers() {
        let id = ProductId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let parsed: CartItemId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed.as_i64(), 7);
    }

    #[test]
    fn row_id_display_matches_raw_value() {
        assert_eq!(OrderId::new(1001).to_string(), "1001");
        assert_eq!(i64::from(UserId::new(9)), 9);
    }
}
