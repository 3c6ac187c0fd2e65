use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use stockledger_infra::EngineError;
use stockledger_inventory::{ProductId, StockOperation};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/sync", post(sync_post).get(sync_get))
        .route("/adjustments", post(adjust_stock))
}

pub async fn sync_post(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SyncRequest>, JsonRejection>,
) -> axum::response::Response {
    match body {
        Ok(Json(req)) => run_sync_action(&services, req).await,
        Err(e) => errors::bad_request(e),
    }
}

pub async fn sync_get(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::SyncRequest>, QueryRejection>,
) -> axum::response::Response {
    match query {
        Ok(Query(req)) => run_sync_action(&services, req).await,
        Err(e) => errors::bad_request(e),
    }
}

const ACTIONS: &str = "sync-all, sync-product, validate-stock, get-breakdown, calculate-stock";

async fn run_sync_action(
    services: &AppServices,
    req: dto::SyncRequest,
) -> axum::response::Response {
    let Some(action) = req.action.as_deref().map(str::trim) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("action is required (one of: {ACTIONS})"),
        );
    };

    let engine = &services.engine;
    let result: Result<Value, axum::response::Response> = match action {
        "sync-all" => engine.sync_all().await.map(to_value).map_err(engine_error),
        "sync-product" => match product_id(&req) {
            Ok(id) => engine.sync_product(id).await.map(to_value).map_err(engine_error),
            Err(res) => Err(res),
        },
        "validate-stock" => validate(services, &req).await,
        "get-breakdown" => match product_id(&req) {
            Ok(id) => engine
                .breakdown(id)
                .await
                .map(|b| json!({ "productId": id, "breakdown": b }))
                .map_err(engine_error),
            Err(res) => Err(res),
        },
        "calculate-stock" => match product_id(&req) {
            Ok(id) => engine
                .calculate(id)
                .await
                .map(|stock| json!({ "productId": id, "calculatedStock": stock }))
                .map_err(engine_error),
            Err(res) => Err(res),
        },
        other => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_action",
            format!("unknown action {other:?} (expected one of: {ACTIONS})"),
        )),
    };

    match result {
        Ok(mut value) => {
            if let Value::Object(map) = &mut value {
                map.insert("action".into(), Value::String(action.to_string()));
            }
            errors::success(StatusCode::OK, value)
        }
        Err(res) => res,
    }
}

async fn validate(
    services: &AppServices,
    req: &dto::SyncRequest,
) -> Result<Value, axum::response::Response> {
    let product_id = product_id(req)?;
    let quantity = dto::require_quantity(req.quantity, "quantity")?;
    let operation = match req.operation.as_deref() {
        None => StockOperation::Deduct,
        Some(raw) => raw
            .trim()
            .parse::<StockOperation>()
            .map_err(|e| engine_error(e.into()))?,
    };

    services
        .engine
        .validate(product_id, quantity, operation)
        .await
        .map(to_value)
        .map_err(engine_error)
}

fn product_id(req: &dto::SyncRequest) -> Result<ProductId, axum::response::Response> {
    match req.product_id.as_deref() {
        Some(raw) => dto::parse_product_id(raw),
        None => Err(engine_error(EngineError::validation(
            "productId is required for this action",
        ))),
    }
}

fn to_value(body: impl serde::Serialize) -> Value {
    serde_json::to_value(body).unwrap_or(Value::Null)
}

fn engine_error(err: EngineError) -> axum::response::Response {
    errors::engine_error_to_response(err)
}

/// Compensating correction; history is never edited.
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::AdjustStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return errors::bad_request(e),
    };
    let product_id = match dto::parse_product_id(&body.product_id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let Some(delta) = body.delta else {
        return engine_error(EngineError::validation("delta is required"));
    };
    let reason = body.reason.unwrap_or_default();

    match services.engine.adjust_stock(product_id, delta, reason).await {
        Ok(movement) => errors::success(StatusCode::CREATED, movement),
        Err(e) => engine_error(e),
    }
}
