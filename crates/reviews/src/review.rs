use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderkit_core::{AggregateRoot, DomainError, DomainResult, OrderId, ProductId, ReviewId, UserId};

use crate::Rating;

pub const MAX_COMMENT_LEN: usize = 2000;

/// Aggregate root: Review.
///
/// At most one review exists per `(user_id, order_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    id: ReviewId,
    product_id: ProductId,
    order_id: OrderId,
    user_id: UserId,
    /// Author display name, denormalized at creation.
    name: String,
    rating: Rating,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Review {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ReviewId,
        product_id: ProductId,
        order_id: OrderId,
        user_id: UserId,
        name: impl Into<String>,
        rating: Rating,
        comment: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let comment = validate_comment(comment.into())?;
        Ok(Self {
            id,
            product_id,
            order_id,
            user_id,
            name: name.into(),
            rating,
            comment,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a review from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ReviewId,
        product_id: ProductId,
        order_id: OrderId,
        user_id: UserId,
        name: String,
        rating: Rating,
        comment: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            order_id,
            user_id,
            name,
            rating,
            comment,
            created_at,
            updated_at,
        }
    }

    pub fn id_typed(&self) -> ReviewId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Replace rating and/or comment. `None` keeps the current value.
    pub fn revise(
        &mut self,
        rating: Option<Rating>,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(comment) = comment {
            self.comment = validate_comment(comment)?;
        }
        if let Some(rating) = rating {
            self.rating = rating;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn validate_comment(comment: String) -> DomainResult<String> {
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("comment cannot be empty"));
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(DomainError::validation("comment is too long"));
    }
    Ok(trimmed.to_string())
}

impl AggregateRoot for Review {
    type Id = ReviewId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        1
    }
}
