//! MongoDB storage for customer records

use super::{CustomerFilter, CustomerStore, StoreError, StoreResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use customer_common::{Address, Customer, NewCustomer};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const CUSTOMERS: &str = "customers";

/// Server error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Customer document as stored
#[derive(Debug, Serialize, Deserialize)]
struct CustomerDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    email: String,
    phone: String,
    #[serde(default)]
    addresses: Vec<AddressDocument>,
    created_at: BsonDateTime,
}

/// Address sub-document embedded in a customer
#[derive(Debug, Serialize, Deserialize)]
struct AddressDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    line1: String,
    #[serde(default)]
    area: Option<String>,
    city: String,
    pincode: String,
    created_at: BsonDateTime,
}

/// `addresses`-only projection of a customer
#[derive(Debug, Deserialize)]
struct AddressesProjection {
    #[serde(default)]
    addresses: Vec<AddressDocument>,
}

impl CustomerDocument {
    fn into_model(self) -> StoreResult<Customer> {
        let id = self
            .id
            .ok_or_else(|| StoreError::Backend("customer document without _id".to_string()))?;

        Ok(Customer {
            id: id.to_hex(),
            name: self.name,
            email: self.email,
            phone: self.phone,
            addresses: self.addresses.into_iter().map(Address::from).collect(),
            created_at: self.created_at.to_chrono(),
        })
    }
}

impl From<AddressDocument> for Address {
    fn from(doc: AddressDocument) -> Self {
        Address {
            id: doc.id.to_hex(),
            line1: doc.line1,
            area: doc.area,
            city: doc.city,
            pincode: doc.pincode,
            created_at: doc.created_at.to_chrono(),
        }
    }
}

impl TryFrom<&Address> for AddressDocument {
    type Error = StoreError;

    fn try_from(address: &Address) -> StoreResult<Self> {
        let id = ObjectId::parse_str(&address.id)
            .map_err(|e| StoreError::Backend(format!("invalid address id: {}", e)))?;

        Ok(AddressDocument {
            id,
            line1: address.line1.clone(),
            area: address.area.clone(),
            city: address.city.clone(),
            pincode: address.pincode.clone(),
            created_at: BsonDateTime::from_chrono(address.created_at),
        })
    }
}

/// Classify a driver error, singling out unique index violations
fn classify(err: mongodb::error::Error) -> StoreError {
    let duplicate = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    };

    if duplicate {
        StoreError::DuplicateKey(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

/// Case-insensitive literal substring match on `email`
fn email_filter(filter: &CustomerFilter) -> Document {
    match &filter.email_contains {
        Some(email) => doc! {
            "email": { "$regex": regex::escape(email), "$options": "i" }
        },
        None => doc! {},
    }
}

/// MongoDB-backed customer store.
///
/// Holds a pooled client; clones of the driver handles are cheap and share
/// the same pool.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and probe the server with a `ping`
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("Failed to create MongoDB client")?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to connect to MongoDB")?;

        info!(db = db_name, "MongoDB connection successful");

        Ok(Self {
            db: client.database(db_name),
        })
    }

    fn customers(&self) -> Collection<CustomerDocument> {
        self.db.collection(CUSTOMERS)
    }

    /// Create the unique contact indexes and the nested address id index
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "phone": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "addresses._id": 1 })
                .build(),
        ];

        self.customers()
            .create_indexes(indexes)
            .await
            .context("Failed to create indexes")?;

        info!(collection = CUSTOMERS, "Indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for MongoStore {
    async fn insert_customer(&self, customer: NewCustomer) -> StoreResult<Customer> {
        let document = CustomerDocument {
            id: None,
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
            addresses: Vec::new(),
            created_at: BsonDateTime::now(),
        };

        let result = self
            .customers()
            .insert_one(&document)
            .await
            .map_err(classify)?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Backend("inserted _id is not an ObjectId".to_string()))?;

        debug!(customer_id = %id, "Inserted customer");

        // Return what the store actually holds
        self.find_customer(&id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("inserted customer {} not found", id)))
    }

    async fn find_customer(&self, id: &ObjectId) -> StoreResult<Option<Customer>> {
        self.customers()
            .find_one(doc! { "_id": *id })
            .await
            .map_err(classify)?
            .map(CustomerDocument::into_model)
            .transpose()
    }

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        skip: u64,
        limit: i64,
    ) -> StoreResult<Vec<Customer>> {
        let documents: Vec<CustomerDocument> = self
            .customers()
            .find(email_filter(filter))
            .skip(skip)
            .limit(limit)
            .await
            .map_err(classify)?
            .try_collect()
            .await
            .map_err(classify)?;

        documents
            .into_iter()
            .map(CustomerDocument::into_model)
            .collect()
    }

    async fn push_address(&self, customer_id: &ObjectId, address: &Address) -> StoreResult<bool> {
        let document = AddressDocument::try_from(address)?;
        let document = bson::to_bson(&document)
            .map_err(|e| StoreError::Backend(format!("Failed to serialize address: {}", e)))?;

        let result = self
            .customers()
            .update_one(
                doc! { "_id": *customer_id },
                doc! { "$push": { "addresses": document } },
            )
            .await
            .map_err(classify)?;

        Ok(result.matched_count > 0)
    }

    async fn find_addresses(&self, customer_id: &ObjectId) -> StoreResult<Option<Vec<Address>>> {
        let projection = self
            .db
            .collection::<AddressesProjection>(CUSTOMERS)
            .find_one(doc! { "_id": *customer_id })
            .projection(doc! { "addresses": 1, "_id": 0 })
            .await
            .map_err(classify)?;

        Ok(projection.map(|p| p.addresses.into_iter().map(Address::from).collect()))
    }

    async fn find_address(&self, address_id: &ObjectId) -> StoreResult<Option<Address>> {
        // Positional projection keeps only the matching element
        let projection = self
            .db
            .collection::<AddressesProjection>(CUSTOMERS)
            .find_one(doc! { "addresses._id": *address_id })
            .projection(doc! { "_id": 0, "addresses.$": 1 })
            .await
            .map_err(classify)?;

        Ok(projection
            .and_then(|p| p.addresses.into_iter().next())
            .map(Address::from))
    }
}
