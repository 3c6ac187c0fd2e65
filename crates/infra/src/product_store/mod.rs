//! Product catalog with the cached `current_stock` counter.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use stockledger_inventory::{Product, ProductId};

use crate::error::StoreError;

pub use in_memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;

/// Catalog storage.
///
/// The counter written by `set_current_stock` is a cache; the ledger stays authoritative.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fails with `Duplicate` when the id is already registered.
    async fn insert(&self, product: Product) -> Result<(), StoreError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products ordered by name.
    async fn list(&self) -> Result<Vec<Product>, StoreError>;

    /// Overwrite the cached counter. Fails with `NotFound` for an unknown id.
    async fn set_current_stock(&self, id: ProductId, value: i64) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        (**self).insert(product).await
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list().await
    }

    async fn set_current_stock(&self, id: ProductId, value: i64) -> Result<(), StoreError> {
        (**self).set_current_stock(id, value).await
    }
}
