use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::AggregateId;
use stockledger_inventory::{Product, ProductId};

use super::ProductStore;
use crate::error::{StoreError, map_sqlx_error};

/// Postgres-backed catalog (`products` table).
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT product_id, name, category, cost_price, sale_price,
           current_stock, created_at, updated_at
    FROM products
"#;

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        let cost_price = price_to_column(product.cost_price)?;
        let sale_price = price_to_column(product.sale_price)?;
        sqlx::query(
            r#"
            INSERT INTO products (
                product_id, name, category, cost_price, sale_price,
                current_stock, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.0.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(cost_price)
        .bind(sale_price)
        .bind(product.current_stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_product", e) {
            StoreError::Concurrency(_) => {
                StoreError::Duplicate(format!("product {}", product.id))
            }
            other => other,
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_PRODUCT} WHERE product_id = $1"))
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_PRODUCT} ORDER BY name ASC, product_id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(decode_product).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn set_current_stock(&self, id: ProductId, value: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = $2, updated_at = NOW()
            WHERE product_id = $1
            "#,
        )
        .bind(id.0.as_uuid())
        .bind(value)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_current_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {id}")));
        }
        Ok(())
    }
}

fn decode_product(row: &sqlx::postgres::PgRow) -> Result<Product, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_product", e);

    let product_id: Uuid = row.try_get("product_id").map_err(get)?;
    let cost_price: i64 = row.try_get("cost_price").map_err(get)?;
    let sale_price: i64 = row.try_get("sale_price").map_err(get)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(get)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(get)?;

    Ok(Product {
        id: ProductId::new(AggregateId::from_uuid(product_id)),
        name: row.try_get("name").map_err(get)?,
        category: row.try_get("category").map_err(get)?,
        cost_price: price_from_column(cost_price)?,
        sale_price: price_from_column(sale_price)?,
        current_stock: row.try_get("current_stock").map_err(get)?,
        created_at,
        updated_at,
    })
}

fn price_to_column(price: u64) -> Result<i64, StoreError> {
    i64::try_from(price)
        .map_err(|_| StoreError::Serialization(format!("price {price} exceeds BIGINT")))
}

fn price_from_column(price: i64) -> Result<u64, StoreError> {
    u64::try_from(price)
        .map_err(|_| StoreError::Serialization(format!("negative price {price} in products")))
}
