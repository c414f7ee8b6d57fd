use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};

use crate::{
    AppState,
    api::{
        dispatcher::dispatch_method,
        types::{JsonRpcRequest, JsonRpcResponse},
    },
    error::{AppError, JsonRpcErrorResponse},
    middleware::logging::{INTERNAL_KEY_HEADER, SIGNATURE_HEADER},
    services::{ai_tasks, printer},
    utils::security::keys_match,
};

const MAX_BODY_SIZE: usize = 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/printer/logistics-callback", post(logistics_callback))
        .route("/ai/callback/{provider_id}", post(ai_callback))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn rpc_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let presented = header_value(&parts.headers, INTERNAL_KEY_HEADER).unwrap_or_default();
    if !keys_match(&state.config.server.internal_api_key, presented) {
        tracing::warn!("RPC call without a valid internal key");
        return build_json_response(
            StatusCode::UNAUTHORIZED,
            JsonRpcErrorResponse::from_error(&AppError::Unauthorized, None),
        );
    }

    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(b) => b,
        Err(e) => {
            let msg = if e.to_string().contains("length limit") {
                "Request body too large (max 1MB)"
            } else {
                "Parse error"
            };
            return build_json_response(
                StatusCode::OK,
                JsonRpcErrorResponse::from_error(&AppError::InvalidParams(msg.into()), None),
            );
        }
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body_bytes) {
        Ok(req) => req,
        Err(_) => {
            return build_json_response(
                StatusCode::OK,
                JsonRpcErrorResponse::from_error(
                    &AppError::InvalidParams("Parse error".into()),
                    None,
                ),
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return build_json_response(
            StatusCode::OK,
            JsonRpcErrorResponse::from_error(
                &AppError::InvalidParams("Invalid JSON-RPC version".into()),
                request.id,
            ),
        );
    }

    tracing::debug!(method = %request.method, "RPC call");

    match dispatch_method(&request.method, request.params, state).await {
        Ok(value) => {
            let response_value = serde_json::to_value(JsonRpcResponse::new(value, request.id))
                .unwrap_or_else(|_| {
                    JsonRpcErrorResponse::from_error(
                        &AppError::InternalServerError("Response serialization failed".into()),
                        None,
                    )
                });
            build_json_response(StatusCode::OK, response_value)
        }
        Err(err) => build_json_response(
            StatusCode::OK,
            JsonRpcErrorResponse::from_error(&err, request.id),
        ),
    }
}

fn build_json_response(status: StatusCode, value: Value) -> Response {
    let body = serde_json::to_string(&value)
        .unwrap_or_else(|_| r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603}}"#.to_string());

    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Shipping updates from the print house. The signature covers the raw body.
async fn logistics_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let ack = printer::logistics_callback(
        &state,
        &body,
        header_value(&headers, SIGNATURE_HEADER),
    )
    .await?;

    Ok(Json(json!(ack)))
}

/// Result pushed by an AI provider for one of its tasks.
async fn ai_callback(
    State(state): State<AppState>,
    Path(provider_id): Path<i32>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let task = ai_tasks::provider_reply(
        &state,
        provider_id,
        &body,
        header_value(&headers, SIGNATURE_HEADER),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "taskId": task.id,
        "status": task.status,
    })))
}
