//! Review eligibility gate.
//!
//! A review is tied to one order line. Creating it flips the line's
//! `is_reviewed` flag from false to true with a conditional update, which is
//! what enforces "one review per (user, order, product)" under concurrency;
//! the review store's unique key backs it up. Deleting flips the flag back.
//! Deleting clears the flag before the review row goes, so a failed delete
//! never leaves a flagged line without a review. The product's rating and
//! review count are recomputed by the review store after every change.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use orderkit_core::{OrderId, ProductId, ReviewId, UserId};
use orderkit_orders::OrderStatus;
use orderkit_reviews::{Rating, Review};

use crate::error::ServiceError;
use crate::store::{CasOutcome, OrderStore, ReviewStore, StoreError, Stores};

/// Input for `ReviewGate::create_review`.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Author display name.
    pub name: String,
    pub rating: i64,
    pub comment: String,
}

#[derive(Clone)]
pub struct ReviewGate {
    orders: Arc<dyn OrderStore>,
    reviews: Arc<dyn ReviewStore>,
}

impl ReviewGate {
    pub fn new(stores: &Stores) -> Self {
        Self {
            orders: stores.orders.clone(),
            reviews: stores.reviews.clone(),
        }
    }

    #[instrument(skip(self, input), fields(product_id = %input.product_id, order_id = %input.order_id), err)]
    pub async fn create_review(&self, input: NewReview) -> Result<Review, ServiceError> {
        let NewReview {
            product_id,
            order_id,
            user_id,
            name,
            rating,
            comment,
        } = input;

        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        if order.status() != OrderStatus::Completed {
            return Err(ServiceError::ReviewNotEligible {
                status: order.status(),
            });
        }
        let line = order
            .line(product_id)
            .ok_or(ServiceError::OrderLineNotFound(product_id))?;
        if line.is_reviewed {
            return Err(ServiceError::ReviewAlreadyExists);
        }

        let rating = Rating::try_from(rating)?;
        let review = Review::new(
            ReviewId::new(),
            product_id,
            order_id,
            user_id,
            name,
            rating,
            comment,
            Utc::now(),
        )?;

        match self
            .orders
            .set_line_reviewed(order_id, product_id, false, true)
            .await?
        {
            CasOutcome::Applied(_) => {}
            CasOutcome::Stale { .. } => return Err(ServiceError::ReviewAlreadyExists),
        }

        if let Err(err) = self.reviews.insert_review(&review).await {
            self.reset_flag(order_id, product_id).await;
            return Err(match err {
                StoreError::Conflict(_) => ServiceError::ReviewAlreadyExists,
                other => ServiceError::Store(other),
            });
        }

        info!(review_id = %review.id_typed(), "review created");
        self.refresh_summary(product_id).await;
        Ok(review)
    }

    /// Change rating and/or comment of the caller's own review.
    #[instrument(skip(self, comment), err)]
    pub async fn update_review(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        rating: Option<i64>,
        comment: Option<String>,
    ) -> Result<Review, ServiceError> {
        let mut review = self.load(review_id).await?;
        if !review.is_authored_by(user_id) {
            return Err(ServiceError::NotAuthorized);
        }

        let rating = rating.map(Rating::try_from).transpose()?;
        review.revise(rating, comment, Utc::now())?;
        self.reviews.update_review(&review).await?;

        self.refresh_summary(review.product_id()).await;
        Ok(review)
    }

    /// Delete the caller's own review and make the line reviewable again.
    #[instrument(skip(self), err)]
    pub async fn delete_review(&self, review_id: ReviewId, user_id: UserId) -> Result<(), ServiceError> {
        let review = self.load(review_id).await?;
        if !review.is_authored_by(user_id) {
            return Err(ServiceError::NotAuthorized);
        }
        self.remove(review).await
    }

    /// Moderator delete: same effect, no ownership check.
    #[instrument(skip(self), err)]
    pub async fn admin_delete_review(&self, review_id: ReviewId) -> Result<(), ServiceError> {
        let review = self.load(review_id).await?;
        self.remove(review).await
    }

    async fn load(&self, review_id: ReviewId) -> Result<Review, ServiceError> {
        self.reviews
            .get_review(review_id)
            .await?
            .ok_or(ServiceError::ReviewNotFound(review_id))
    }

    async fn remove(&self, review: Review) -> Result<(), ServiceError> {
        let order_id = review.order_id();
        let product_id = review.product_id();

        let cleared = match self
            .orders
            .set_line_reviewed(order_id, product_id, true, false)
            .await?
        {
            CasOutcome::Applied(_) => true,
            CasOutcome::Stale { .. } => {
                warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    "deleting review of an order line that was not flagged"
                );
                false
            }
        };

        let deleted = self.reviews.delete_review(review.id_typed()).await;
        if !matches!(deleted, Ok(true)) {
            if cleared {
                self.restore_flag(order_id, product_id).await;
            }
            return Err(match deleted {
                Err(err) => ServiceError::Store(err),
                Ok(_) => ServiceError::ReviewNotFound(review.id_typed()),
            });
        }

        info!(review_id = %review.id_typed(), "review deleted");
        self.refresh_summary(product_id).await;
        Ok(())
    }

    async fn reset_flag(&self, order_id: OrderId, product_id: ProductId) {
        if let Err(err) = self
            .orders
            .set_line_reviewed(order_id, product_id, true, false)
            .await
        {
            error!(
                order_id = %order_id,
                product_id = %product_id,
                error = %err,
                "could not reset review flag after failed insert"
            );
        }
    }

    async fn restore_flag(&self, order_id: OrderId, product_id: ProductId) {
        if let Err(err) = self
            .orders
            .set_line_reviewed(order_id, product_id, false, true)
            .await
        {
            error!(
                order_id = %order_id,
                product_id = %product_id,
                error = %err,
                "could not restore review flag after failed delete"
            );
        }
    }

    /// The review write has already committed, so a failure here is logged
    /// rather than returned.
    async fn refresh_summary(&self, product_id: ProductId) {
        if let Err(err) = self.reviews.refresh_product_summary(product_id).await {
            error!(product_id = %product_id, error = %err, "review summary not updated");
        }
    }
}
