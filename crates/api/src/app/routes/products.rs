use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use orderkit_auth::Permission;
use orderkit_core::{Money, OrderId, ProductId, ReviewId};
use orderkit_infra::review_gate::NewReview;

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product))
        .route("/:id", get(get_product))
        .route("/:id/price", put(update_price))
        .route("/:id/restock", post(restock))
        .route("/:id/reviews", get(list_reviews).post(create_review))
        .route(
            "/:id/reviews/:review_id",
            put(update_review).delete(delete_review),
        )
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &Permission::CATALOG_MANAGE) {
        return res;
    }

    match services
        .catalog
        .register(body.name, Money::from_cents(body.price_cents), body.stock)
        .await
    {
        Ok(product) => (StatusCode::CREATED, Json(dto::ProductResponse::from(&product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Product with its current stock, rating and reviews.
pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let product = match services.catalog.get(product_id).await {
        Ok(p) => p,
        Err(e) => return errors::service_error_to_response(e),
    };
    let reviews = match services.catalog.reviews(product_id).await {
        Ok(r) => r,
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(dto::ProductResponse::from(&product).with_reviews(&reviews)),
    )
        .into_response()
}

pub async fn update_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePriceRequest>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &Permission::CATALOG_MANAGE) {
        return res;
    }
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .catalog
        .update_price(product_id, Money::from_cents(body.price_cents))
        .await
    {
        Ok(product) => (StatusCode::OK, Json(dto::ProductResponse::from(&product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn restock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RestockRequest>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &Permission::CATALOG_MANAGE) {
        return res;
    }
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.catalog.restock(product_id, body.quantity).await {
        Ok(product) => (StatusCode::OK, Json(dto::ProductResponse::from(&product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.catalog.reviews(product_id).await {
        Ok(reviews) => (
            StatusCode::OK,
            Json(reviews.iter().map(dto::ReviewResponse::from).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateReviewRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let order_id: OrderId = match errors::parse_id(&body.order_id, "order") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let input = NewReview {
        product_id,
        order_id,
        user_id: principal.user_id(),
        name: principal.name().to_string(),
        rating: body.rating,
        comment: body.comment,
    };

    match services.reviews.create_review(input).await {
        Ok(review) => (StatusCode::CREATED, Json(dto::ReviewResponse::from(&review))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Edit the caller's own review. The review id alone identifies it.
pub async fn update_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((_product_id, review_id)): Path<(String, String)>,
    Json(body): Json<dto::UpdateReviewRequest>,
) -> axum::response::Response {
    let review_id: ReviewId = match errors::parse_id(&review_id, "review") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .reviews
        .update_review(review_id, principal.user_id(), body.rating, body.comment)
        .await
    {
        Ok(review) => (StatusCode::OK, Json(dto::ReviewResponse::from(&review))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((_product_id, review_id)): Path<(String, String)>,
) -> axum::response::Response {
    let review_id: ReviewId = match errors::parse_id(&review_id, "review") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .reviews
        .delete_review(review_id, principal.user_id())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
