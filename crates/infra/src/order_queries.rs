//! Read side for orders: single order, per-user and admin listings, sales.

use std::sync::Arc;

use chrono::{Days, NaiveTime};
use tracing::instrument;

use orderkit_core::{OrderId, UserId};
use orderkit_orders::{DailySales, DateRange, Order, daily_sales};

use crate::error::ServiceError;
use crate::store::OrderStore;

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub is_admin: bool,
}

#[derive(Clone)]
pub struct OrderQueries {
    orders: Arc<dyn OrderStore>,
}

impl OrderQueries {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// One order, visible to its owner and to admins.
    ///
    /// Someone else's order is reported as not found.
    #[instrument(skip(self), err)]
    pub async fn get(&self, order_id: OrderId, requester: Requester) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        if !requester.is_admin && order.user_id() != requester.user_id {
            return Err(ServiceError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.list_orders_for_user(user_id).await?)
    }

    /// Every order, newest first.
    pub async fn list_all(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.list_orders().await?)
    }

    /// Daily totals over the inclusive UTC date range.
    #[instrument(skip(self), err)]
    pub async fn sales(&self, range: DateRange) -> Result<Vec<DailySales>, ServiceError> {
        let from = range.start().and_time(NaiveTime::MIN).and_utc();
        let until = range
            .end()
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ServiceError::Validation("endDate out of range".to_string()))?
            .and_time(NaiveTime::MIN)
            .and_utc();

        let orders = self.orders.list_orders_created_between(from, until).await?;
        Ok(daily_sales(orders.iter(), range)?)
    }
}
