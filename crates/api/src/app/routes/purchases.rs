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
    Router::new().route("/receipts", post(receive_purchase))
}

/// Goods received against a purchase order.
pub async fn receive_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let (product_id, quantity, purchase_order) = match body.map_err(errors::bad_request) {
        Ok(Json(b)) => match b.parse() {
            Ok(parts) => parts,
            Err(res) => return res,
        },
        Err(res) => return res,
    };

    match services
        .engine
        .receive_purchase(product_id, quantity, purchase_order)
        .await
    {
        Ok(movement) => errors::success(StatusCode::CREATED, movement),
        Err(e) => errors::engine_error_to_response(e),
    }
}
