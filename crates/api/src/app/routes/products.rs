use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/events", get(list_events))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request(e),
    };
    let (input, opening) = body.into_parts();
    let opening = match opening {
        None | Some(0) => None,
        Some(n) => match dto::require_quantity(Some(n), "openingStock") {
            Ok(q) => Some(q),
            Err(res) => return res,
        },
    };

    match services.engine.register_product(input, opening).await {
        Ok(registration) => errors::success(StatusCode::CREATED, registration),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine.list_products().await {
        Ok(products) => errors::success(StatusCode::OK, json!({ "products": products })),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.engine.get_product(product_id).await {
        Ok(product) => errors::success(StatusCode::OK, json!({ "product": product })),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    query: Result<Query<dto::EventsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };
    let product_id = match dto::parse_product_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.engine.list_events(product_id, query.since).await {
        Ok(events) => errors::success(
            StatusCode::OK,
            json!({ "productId": product_id, "count": events.len(), "events": events }),
        ),
        Err(e) => errors::engine_error_to_response(e),
    }
}
