use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_assignments).post(assign_stock))
        .route("/:id", get(get_assignment))
        .route("/:id/receive", post(receive_assignment))
        .route("/:id/return", post(return_assignment))
}

/// Hand stock to an employee. Nothing leaves the warehouse until they receive it.
pub async fn assign_stock(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::AssignStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return errors::bad_request(e),
    };
    let parsed = dto::parse_employee_id(&body.employee_id).and_then(|employee_id| {
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
        .assign_stock(employee_id, product_id, quantity)
        .await
    {
        Ok(assignment) => errors::success(StatusCode::CREATED, json!({ "assignment": assignment })),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_assignments(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::AssignmentQuery>, QueryRejection>,
) -> axum::response::Response {
    let filter = match query.map_err(errors::bad_request) {
        Ok(Query(q)) => match q.into_filter() {
            Ok(f) => f,
            Err(res) => return res,
        },
        Err(res) => return res,
    };

    match services.engine.list_assignments(filter).await {
        Ok(assignments) => errors::success(
            StatusCode::OK,
            json!({ "count": assignments.len(), "assignments": assignments }),
        ),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let assignment_id = match dto::parse_assignment_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.engine.get_assignment(assignment_id).await {
        Ok(assignment) => errors::success(StatusCode::OK, json!({ "assignment": assignment })),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Employee confirms receipt; the warehouse is deducted here.
pub async fn receive_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let assignment_id = match dto::parse_assignment_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.engine.receive_assignment(assignment_id).await {
        Ok(transition) => errors::success(StatusCode::OK, transition),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn return_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let assignment_id = match dto::parse_assignment_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.engine.return_assignment(assignment_id).await {
        Ok(transition) => errors::success(StatusCode::OK, transition),
        Err(e) => errors::engine_error_to_response(e),
    }
}
