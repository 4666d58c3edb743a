//! In-process customer store for tests

use super::{CustomerFilter, CustomerStore, StoreError, StoreResult};
use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{SubsecRound, Utc};
use customer_common::{Address, Customer, NewCustomer};
use tokio::sync::RwLock;

/// Customer store kept in memory, in insertion order
pub struct MemoryStore {
    customers: RwLock<Vec<Customer>>,
    unique_contacts: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store enforcing unique `email` and `phone`, like the indexed collection
    pub fn new() -> Self {
        Self {
            customers: RwLock::new(Vec::new()),
            unique_contacts: true,
        }
    }

    /// Store without uniqueness constraints
    pub fn without_unique_indexes() -> Self {
        Self {
            customers: RwLock::new(Vec::new()),
            unique_contacts: false,
        }
    }

    /// Number of stored customers
    pub async fn len(&self) -> usize {
        self.customers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn insert_customer(&self, customer: NewCustomer) -> StoreResult<Customer> {
        let mut customers = self.customers.write().await;

        if self.unique_contacts {
            if let Some(existing) = customers
                .iter()
                .find(|c| c.email == customer.email || c.phone == customer.phone)
            {
                let key = if existing.email == customer.email {
                    "email"
                } else {
                    "phone"
                };
                return Err(StoreError::DuplicateKey(format!("{}_1", key)));
            }
        }

        let stored = Customer {
            id: ObjectId::new().to_hex(),
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
            addresses: Vec::new(),
            // BSON dates carry millisecond precision
            created_at: Utc::now().trunc_subsecs(3),
        };

        customers.push(stored.clone());
        Ok(stored)
    }

    async fn find_customer(&self, id: &ObjectId) -> StoreResult<Option<Customer>> {
        let id = id.to_hex();
        let customers = self.customers.read().await;
        Ok(customers.iter().find(|c| c.id == id).cloned())
    }

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        skip: u64,
        limit: i64,
    ) -> StoreResult<Vec<Customer>> {
        let needle = filter.email_contains.as_ref().map(|e| e.to_lowercase());
        let customers = self.customers.read().await;

        let matching = customers.iter().filter(|c| match &needle {
            Some(needle) => c.email.to_lowercase().contains(needle.as_str()),
            None => true,
        });

        let skipped = matching.skip(usize::try_from(skip).unwrap_or(usize::MAX));

        // A zero limit means no limit, as in the driver
        let page: Vec<Customer> = if limit == 0 {
            skipped.cloned().collect()
        } else {
            let take = usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX);
            skipped.take(take).cloned().collect()
        };

        Ok(page)
    }

    async fn push_address(&self, customer_id: &ObjectId, address: &Address) -> StoreResult<bool> {
        let id = customer_id.to_hex();
        let mut customers = self.customers.write().await;

        match customers.iter_mut().find(|c| c.id == id) {
            Some(customer) => {
                customer.addresses.push(address.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_addresses(&self, customer_id: &ObjectId) -> StoreResult<Option<Vec<Address>>> {
        Ok(self
            .find_customer(customer_id)
            .await?
            .map(|customer| customer.addresses))
    }

    async fn find_address(&self, address_id: &ObjectId) -> StoreResult<Option<Address>> {
        let id = address_id.to_hex();
        let customers = self.customers.read().await;

        Ok(customers
            .iter()
            .flat_map(|c| c.addresses.iter())
            .find(|a| a.id == id)
            .cloned())
    }
}
