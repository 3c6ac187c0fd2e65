use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateId, DomainError, DomainResult, Entity};

/// Product identifier. A product is also the ledger stream key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Catalog record with a cached stock counter.
///
/// `current_stock` is a materialized view of the ledger. Writers refresh it after each
/// append and reconciliation overwrites it; nothing reads it to make a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Minor currency units.
    pub cost_price: u64,
    /// Minor currency units.
    pub sale_price: u64,
    pub current_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub cost_price: u64,
    pub sale_price: u64,
}

impl Product {
    pub fn register(id: ProductId, input: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let category = input.category.trim();
        if category.is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        let max_price = i64::MAX as u64;
        if input.cost_price > max_price || input.sale_price > max_price {
            return Err(DomainError::validation("price is out of range"));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            category: category.to_string(),
            cost_price: input.cost_price,
            sale_price: input.sale_price,
            current_stock: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn set_cached_stock(&mut self, value: i64, now: DateTime<Utc>) {
        self.current_stock = value;
        self.updated_at = now;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
