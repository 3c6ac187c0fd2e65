use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use stockledger_inventory::{Product, ProductId};

use super::ProductStore;
use crate::error::StoreError;

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        if products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product {}", product.id)));
        }
        products.insert(product.id, product);
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(products.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let mut out: Vec<Product> = products.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn set_current_stock(&self, id: ProductId, value: i64) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let product = products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product.set_cached_stock(value, Utc::now());
        Ok(())
    }
}
