use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/deposits", post(record_deposit))
        .route("/refills", post(record_refill))
        .route("/returns", post(record_return))
}

#[derive(Debug, Clone, Copy)]
enum CylinderMovement {
    Deposit,
    Refill,
    Return,
}

async fn handle(
    services: Arc<AppServices>,
    movement: CylinderMovement,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let (product_id, quantity, reference) = match body.map_err(errors::bad_request) {
        Ok(Json(b)) => match b.parse() {
            Ok(parts) => parts,
            Err(res) => return res,
        },
        Err(res) => return res,
    };

    let engine = &services.engine;
    let result = match movement {
        CylinderMovement::Deposit => engine.record_deposit(product_id, quantity, reference).await,
        CylinderMovement::Refill => engine.record_refill(product_id, quantity, reference).await,
        CylinderMovement::Return => {
            engine
                .record_cylinder_return(product_id, quantity, reference)
                .await
        }
    };

    match result {
        Ok(movement) => errors::success(StatusCode::CREATED, movement),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn record_deposit(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    handle(services, CylinderMovement::Deposit, body).await
}

pub async fn record_refill(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    handle(services, CylinderMovement::Refill, body).await
}

/// Customer hands a cylinder back to the warehouse.
pub async fn record_return(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    handle(services, CylinderMovement::Return, body).await
}
