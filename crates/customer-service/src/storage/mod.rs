//! Document store gateway for customer records

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use bson::oid::ObjectId;
use customer_common::{Address, Customer, Error, NewCustomer};
use thiserror::Error;

/// Failure reported by a store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique index rejected the write
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(_) => Error::Conflict(
                "Email or phone already exists. (Have you created unique indexes?)".to_string(),
            ),
            StoreError::Backend(message) => Error::Database(message),
        }
    }
}

/// Filter for listing customers
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    /// Case-insensitive substring match on `email`
    pub email_contains: Option<String>,
}

/// Collection-level operations over the `customers` collection.
///
/// Implementations are shared by every request and must be safe for
/// concurrent use without external locking.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Insert a customer with no addresses and return the stored document
    async fn insert_customer(&self, customer: NewCustomer) -> StoreResult<Customer>;

    async fn find_customer(&self, id: &ObjectId) -> StoreResult<Option<Customer>>;

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        skip: u64,
        limit: i64,
    ) -> StoreResult<Vec<Customer>>;

    /// Append an address to a customer in one atomic update.
    /// Returns `false` when no customer matched, in which case nothing was written.
    async fn push_address(&self, customer_id: &ObjectId, address: &Address) -> StoreResult<bool>;

    /// Only the `addresses` of a customer, `None` if the customer is absent
    async fn find_addresses(&self, customer_id: &ObjectId) -> StoreResult<Option<Vec<Address>>>;

    /// Look up an address by id across all customers
    async fn find_address(&self, address_id: &ObjectId) -> StoreResult<Option<Address>>;
}

/// Parse a path identifier, rejecting anything that is not an ObjectId
pub fn parse_object_id(raw: &str, label: &str) -> customer_common::Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| Error::validation(format!("Invalid {} format", label)))
}
