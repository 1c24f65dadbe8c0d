use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a string-backed identifier newtype.
///
/// Document ids in the store are plain strings, so every identifier wraps a
/// `String` to keep shop ids, customer ids and order ids from being mixed up.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is empty or whitespace only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Consumes the identifier and returns the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Customer identifier (the customer's username); keys the cart document.
    CustomerId
);
string_id!(
    /// User account document id; owns the wallet balance.
    UserId
);
string_id!(
    /// Shop document id.
    ShopId
);
string_id!(
    /// Vendor (shop owner) id.
    VendorId
);
string_id!(
    /// Menu item id within a shop.
    MenuItemId
);
string_id!(
    /// Order document id. Also used as the history id once archived.
    OrderId
);
string_id!(
    /// Reservation document id.
    ReservationId
);

fn generate_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl OrderId {
    /// Generates a new random order id.
    pub fn generate() -> Self {
        Self(generate_document_id())
    }
}

impl ReservationId {
    /// Generates a new random reservation id.
    pub fn generate() -> Self {
        Self(generate_document_id())
    }
}

impl ShopId {
    /// Generates a new random shop id.
    pub fn generate() -> Self {
        Self(generate_document_id())
    }
}

impl MenuItemId {
    /// Generates a new random menu item id.
    pub fn generate() -> Self {
        Self(generate_document_id())
    }
}

impl From<CustomerId> for UserId {
    fn from(id: CustomerId) -> Self {
        Self(id.0)
    }
}
