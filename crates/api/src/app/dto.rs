use chrono::{DateTime, Utc};
use serde::Deserialize;

use stockledger_core::{AggregateId, EmployeeId};
use stockledger_infra::{AssignmentFilter, EngineError};
use stockledger_inventory::{AssignmentId, AssignmentStatus, NewProduct, ProductId, Quantity};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub cost_price: u64,
    #[serde(default)]
    pub sale_price: u64,
    pub opening_stock: Option<i64>,
}

impl CreateProductRequest {
    pub fn into_parts(self) -> (NewProduct, Option<i64>) {
        (
            NewProduct {
                name: self.name,
                category: self.category,
                cost_price: self.cost_price,
                sale_price: self.sale_price,
            },
            self.opening_stock,
        )
    }
}

/// Body shared by purchase receipts, sales and cylinder movements.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRequest {
    pub product_id: String,
    pub quantity: Option<i64>,
    /// Purchase order, sale or deposit identifier in the calling system.
    #[serde(alias = "purchaseOrderId", alias = "saleId")]
    pub reference: Option<String>,
}

impl StockMovementRequest {
    pub fn parse(self) -> Result<(ProductId, Quantity, Option<String>), axum::response::Response> {
        let product_id = parse_product_id(&self.product_id)?;
        let quantity = require_quantity(self.quantity, "quantity")?;
        Ok((product_id, quantity, self.reference))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub product_id: String,
    pub delta: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignStockRequest {
    pub employee_id: String,
    pub product_id: String,
    pub quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentQuery {
    pub employee_id: Option<String>,
    pub product_id: Option<String>,
    pub status: Option<String>,
}

impl AssignmentQuery {
    pub fn into_filter(self) -> Result<AssignmentFilter, axum::response::Response> {
        Ok(AssignmentFilter {
            employee_id: self.employee_id.as_deref().map(parse_employee_id).transpose()?,
            product_id: self.product_id.as_deref().map(parse_product_id).transpose()?,
            status: self
                .status
                .as_deref()
                .map(|s| s.parse::<AssignmentStatus>().map_err(domain_error))
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSaleRequest {
    pub product_id: String,
    pub quantity: Option<i64>,
    #[serde(alias = "saleId")]
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub since: Option<DateTime<Utc>>,
}

/// `/stock/sync` body and query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub action: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub operation: Option<String>,
}

// -------------------------
// Parsing helpers
// -------------------------

fn domain_error(err: stockledger_core::DomainError) -> axum::response::Response {
    errors::engine_error_to_response(EngineError::from(err))
}

pub fn parse_product_id(s: &str) -> Result<ProductId, axum::response::Response> {
    s.parse::<AggregateId>().map(ProductId::new).map_err(domain_error)
}

pub fn parse_assignment_id(s: &str) -> Result<AssignmentId, axum::response::Response> {
    s.parse::<AggregateId>()
        .map(AssignmentId::new)
        .map_err(domain_error)
}

pub fn parse_employee_id(s: &str) -> Result<EmployeeId, axum::response::Response> {
    s.parse::<EmployeeId>().map_err(domain_error)
}

/// A present, strictly positive quantity.
pub fn require_quantity(
    value: Option<i64>,
    field: &str,
) -> Result<Quantity, axum::response::Response> {
    let value = value.ok_or_else(|| {
        errors::engine_error_to_response(EngineError::validation(format!("{field} is required")))
    })?;
    Quantity::from_signed(value).map_err(domain_error)
}
