//! Moderation endpoints.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::delete,
};

use orderkit_auth::Permission;
use orderkit_core::ReviewId;

use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/reviews/:review_id", delete(delete_review))
}

/// Remove any review and reopen its order line for reviewing.
pub async fn delete_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(review_id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &Permission::REVIEWS_MODERATE) {
        return res;
    }
    let review_id: ReviewId = match errors::parse_id(&review_id, "review") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.reviews.admin_delete_review(review_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
