use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:id/sales", post(record_employee_sale))
}

/// Sale made by an employee from stock they hold, deducted oldest assignment first.
pub async fn record_employee_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::EmployeeSaleRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return errors::bad_request(e),
    };
    let parsed = dto::parse_employee_id(&id).and_then(|employee_id| {
        let product_id = dto::parse_product_id(&body.product_id)?;
        let quantity = dto::require_quantity(body.quantity, "quantity")?;
        Ok((employee_id, product_id, quantity))
    });
    let (employee_id, product_id, quantity) = match parsed {
        Ok(parts) => parts,
        Err(res) => return res,
    };

    match services
        .engine
        .record_employee_sale(employee_id, product_id, quantity, body.reference)
        .await
    {
        Ok(sale) => errors::success(StatusCode::CREATED, sale),
        Err(e) => errors::engine_error_to_response(e),
    }
}
