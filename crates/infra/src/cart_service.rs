//! Cart use cases. Carts are created lazily and saved with an optimistic
//! version check.

use std::sync::Arc;

use tracing::instrument;

use orderkit_core::{AggregateRoot, DomainError, ExpectedVersion, ProductId, UserId};
use orderkit_orders::Cart;

use crate::error::ServiceError;
use crate::store::{CartStore, ProductCatalog};

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn ProductCatalog>,
    carts: Arc<dyn CartStore>,
}

impl CartService {
    pub fn new(catalog: Arc<dyn ProductCatalog>, carts: Arc<dyn CartStore>) -> Self {
        Self { catalog, carts }
    }

    /// The user's cart; empty if none was saved yet.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, ServiceError> {
        Ok(self
            .carts
            .load_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    #[instrument(skip(self), err)]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, ServiceError> {
        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(ServiceError::ProductNotFound(product_id));
        }
        self.mutate(user_id, product_id, |cart| cart.add_item(product_id, quantity))
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, ServiceError> {
        self.mutate(user_id, product_id, |cart| cart.update_quantity(product_id, quantity))
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<Cart, ServiceError> {
        self.mutate(user_id, product_id, |cart| cart.remove_item(product_id))
            .await
    }

    /// Load, change and save the cart. A missing line is reported as the
    /// product not being in the cart.
    async fn mutate<F>(&self, user_id: UserId, product_id: ProductId, change: F) -> Result<Cart, ServiceError>
    where
        F: FnOnce(&mut Cart) -> Result<(), DomainError>,
    {
        let mut cart = self.get(user_id).await?;
        let loaded = cart.version();

        change(&mut cart).map_err(|e| match e {
            DomainError::NotFound(_) => ServiceError::ProductNotFound(product_id),
            other => other.into(),
        })?;

        self.carts
            .save_cart(&cart, ExpectedVersion::Exact(loaded))
            .await?;
        Ok(cart)
    }
}
