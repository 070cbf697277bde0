use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use orderkit_core::ProductId;

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_item).delete(remove_item))
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.carts.get(principal.user_id()).await {
        Ok(cart) => (StatusCode::OK, Json(dto::CartResponse::from(&cart))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&body.product_id, "product") {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services
        .carts
        .add_item(principal.user_id(), product_id, body.quantity)
        .await
    {
        Ok(cart) => (StatusCode::OK, Json(dto::CartResponse::from(&cart))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<dto::UpdateCartItemRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id, "product") {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services
        .carts
        .update_quantity(principal.user_id(), product_id, body.quantity)
        .await
    {
        Ok(cart) => (StatusCode::OK, Json(dto::CartResponse::from(&cart))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id, "product") {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.carts.remove_item(principal.user_id(), product_id).await {
        Ok(cart) => (StatusCode::OK, Json(dto::CartResponse::from(&cart))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
