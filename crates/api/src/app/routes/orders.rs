use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use orderkit_auth::Permission;
use orderkit_core::OrderId;
use orderkit_infra::ServiceError;
use orderkit_orders::{DateRange, Order, OrderStatus};

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_my_orders))
        .route("/all", get(list_all_orders))
        .route("/sales", get(sales))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_status))
}

fn orders_body(orders: &[Order]) -> Json<Vec<dto::OrderResponse>> {
    Json(orders.iter().map(dto::OrderResponse::from).collect())
}

/// Checkout: turn the caller's cart into an order.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services
        .creator
        .create_order(principal.user_id(), principal.contact())
        .await
    {
        Ok(order) => (StatusCode::CREATED, Json(dto::OrderResponse::from(&order))).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn list_my_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.queries.list_for_user(principal.user_id()).await {
        Ok(orders) => (StatusCode::OK, orders_body(&orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_all_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &Permission::ORDERS_MANAGE) {
        return res;
    }

    match services.queries.list_all().await {
        Ok(orders) => (StatusCode::OK, orders_body(&orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SalesQuery>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &Permission::ORDERS_MANAGE) {
        return res;
    }

    let range = match DateRange::parse(&query.start_date, &query.end_date) {
        Ok(r) => r,
        Err(e) => return errors::service_error_to_response(ServiceError::from(e)),
    };

    match services.queries.sales(range).await {
        Ok(days) => (
            StatusCode::OK,
            Json(days.iter().map(dto::DailySalesResponse::from).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.queries.get(order_id, principal.requester()).await {
        Ok(order) => (StatusCode::OK, Json(dto::OrderResponse::from(&order))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStatusRequest>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &Permission::ORDERS_MANAGE) {
        return res;
    }

    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let target: OrderStatus = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return errors::service_error_to_response(ServiceError::from(e)),
    };

    match services.lifecycle.transition(order_id, target).await {
        Ok(order) => (StatusCode::OK, Json(dto::OrderResponse::from(&order))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
