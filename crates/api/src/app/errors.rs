use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use orderkit_infra::ServiceError;
use orderkit_infra::store::StoreError;

/// Map a service failure to its HTTP response.
pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let status = status_for(&err);
    respond(err, status)
}

/// Checkout failures: a customer can only act on an empty cart or a stock
/// shortfall, everything else is a server error.
pub fn checkout_error_to_response(err: ServiceError) -> axum::response::Response {
    let status = checkout_status_for(&err);
    respond(err, status)
}

fn respond(err: ServiceError, status: StatusCode) -> axum::response::Response {
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    match &err {
        ServiceError::InsufficientStock {
            product_id,
            available,
            requested,
        } => (
            status,
            axum::Json(json!({
                "error": err.code(),
                "message": err.to_string(),
                "productId": product_id.to_string(),
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        ServiceError::InvalidStatusTransition { from, to } => (
            status,
            axum::Json(json!({
                "error": err.code(),
                "message": err.to_string(),
                "from": from.as_str(),
                "to": to.as_str(),
            })),
        )
            .into_response(),
        _ => json_error(status, err.code(), err.to_string()),
    }
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::EmptyCart
        | ServiceError::InsufficientStock { .. }
        | ServiceError::InvalidStatusTransition { .. }
        | ServiceError::ReviewNotEligible { .. }
        | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::ProductNotFound(_)
        | ServiceError::OrderNotFound(_)
        | ServiceError::OrderLineNotFound(_)
        | ServiceError::ReviewNotFound(_)
        | ServiceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        ServiceError::NotAuthorized => StatusCode::FORBIDDEN,
        ServiceError::StockContention { .. }
        | ServiceError::TransitionConflict { .. }
        | ServiceError::ReviewAlreadyExists
        | ServiceError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        ServiceError::OrderPersistence(_) | ServiceError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn checkout_status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::EmptyCart | ServiceError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
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
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path identifier, answering 400 on garbage.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
