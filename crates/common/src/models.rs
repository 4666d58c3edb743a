//! Customer and address records as exposed over the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer record with its embedded addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Store-generated identifier (hex)
    pub id: String,

    pub name: String,
    pub email: String,
    pub phone: String,

    /// Append-only, in insertion order
    #[serde(default)]
    pub addresses: Vec<Address>,

    pub created_at: DateTime<Utc>,
}

/// Address owned by exactly one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Globally unique identifier (hex), not scoped to the parent
    pub id: String,

    pub line1: String,
    pub area: Option<String>,
    pub city: String,
    pub pincode: String,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Input for appending an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub line1: String,
    pub area: Option<String>,
    pub city: String,
    pub pincode: String,
}

impl Address {
    /// Build an address from its input, stamping id and creation time
    pub fn new(id: String, input: NewAddress, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            line1: input.line1,
            area: input.area,
            city: input.city,
            pincode: input.pincode,
            created_at,
        }
    }
}
