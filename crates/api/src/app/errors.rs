use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::{json, Value};

use stockledger_infra::EngineError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        EngineError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        EngineError::InsufficientStock {
            requested,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "success": false,
                "error": "insufficient_stock",
                "message": format!(
                    "insufficient stock: requested {requested}, available {available}"
                ),
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        EngineError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        EngineError::Store(e) => {
            tracing::error!(error = %e, "store failure while handling request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({
                    "success": false,
                    "error": "store_error",
                    "message": "storage backend failure; the operation was not retried",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Malformed JSON body or query string.
pub fn bad_request(rejection: impl std::fmt::Display) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.to_string())
}

/// `{"success": true, ...body}`; non-object bodies land under `data`.
pub fn success(status: StatusCode, body: impl Serialize) -> axum::response::Response {
    let value = match serde_json::to_value(body) {
        Ok(v) => v,
        Err(e) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "serialization_error",
                e.to_string(),
            )
        }
    };

    let body = match value {
        Value::Object(mut map) => {
            map.insert("success".into(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "success": true, "data": other }),
    };
    (status, axum::Json(body)).into_response()
}
