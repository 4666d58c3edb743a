//! Request and response bodies for the customer API

use customer_common::{Customer, Error, NewAddress, NewCustomer, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Request to create a customer
#[derive(Debug, Default, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CreateCustomerRequest {
    /// All three fields must be present
    pub fn validate(self) -> Result<NewCustomer> {
        match (self.name, self.email, self.phone) {
            (Some(name), Some(email), Some(phone)) => Ok(NewCustomer { name, email, phone }),
            _ => Err(Error::validation("Name, email, and phone are required")),
        }
    }
}

/// Request to append an address to a customer
#[derive(Debug, Default, Deserialize)]
pub struct CreateAddressRequest {
    pub line1: Option<String>,
    pub area: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
}

impl CreateAddressRequest {
    /// `line1`, `city` and `pincode` must be present; `area` is optional
    pub fn validate(self) -> Result<NewAddress> {
        match (self.line1, self.city, self.pincode) {
            (Some(line1), Some(city), Some(pincode)) => Ok(NewAddress {
                line1,
                area: self.area,
                city,
                pincode,
            }),
            _ => Err(Error::validation("line1, city, and pincode are required")),
        }
    }
}

/// Query string for listing customers
#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub email: Option<String>,
}

/// Validated page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Number of documents to skip
    pub fn offset(&self) -> u64 {
        // validation keeps (page - 1) * limit within i64
        ((self.page - 1) * self.limit) as u64
    }
}

impl ListCustomersQuery {
    pub fn pagination(&self) -> Result<Pagination> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 {
            return Err(Error::validation("page must be at least 1"));
        }

        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(Error::validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        if (page - 1).checked_mul(limit).is_none() {
            return Err(Error::validation("page is out of range"));
        }

        Ok(Pagination { page, limit })
    }

    /// Email substring filter; an empty value means no filter
    pub fn email_filter(&self) -> Option<String> {
        self.email.clone().filter(|email| !email.is_empty())
    }
}

/// One page of customers
#[derive(Debug, Serialize)]
pub struct ListCustomersResponse {
    pub page: i64,
    pub limit: i64,
    pub data: Vec<Customer>,
}
