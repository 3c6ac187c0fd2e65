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
    Router::new().route("/", post(record_sale))
}

/// Direct warehouse sale; refused when the ledger cannot cover it.
pub async fn record_sale(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let (product_id, quantity, sale) = match body.map_err(errors::bad_request) {
        Ok(Json(b)) => match b.parse() {
            Ok(parts) => parts,
            Err(res) => return res,
        },
        Err(res) => return res,
    };

    match services.engine.record_sale(product_id, quantity, sale).await {
        Ok(movement) => errors::success(StatusCode::CREATED, movement),
        Err(e) => errors::engine_error_to_response(e),
    }
}
