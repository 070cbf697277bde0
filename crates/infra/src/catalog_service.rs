//! The narrow slice of catalog management the order core needs: register,
//! read, reprice and restock products, and list their reviews.

use std::sync::Arc;

use tracing::{info, instrument};

use orderkit_core::{Money, ProductId};
use orderkit_inventory::Product;
use orderkit_reviews::Review;

use crate::error::ServiceError;
use crate::inventory_guard::InventoryGuard;
use crate::store::{ProductCatalog, ProductStock, ReviewStore, Stores};

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn ProductCatalog>,
    reviews: Arc<dyn ReviewStore>,
    guard: InventoryGuard<Arc<dyn ProductStock>>,
}

impl CatalogService {
    pub fn new(stores: &Stores, cas_max_attempts: u32) -> Self {
        Self {
            catalog: stores.catalog.clone(),
            reviews: stores.reviews.clone(),
            guard: InventoryGuard::with_max_attempts(stores.stock.clone(), cas_max_attempts),
        }
    }

    #[instrument(skip(self, name), err)]
    pub async fn register(&self, name: String, price: Money, stock: i64) -> Result<Product, ServiceError> {
        let product = Product::new(ProductId::new(), name, price, stock)?;
        self.catalog.insert_product(&product).await?;
        info!(product_id = %product.id, "product registered");
        Ok(product)
    }

    pub async fn get(&self, product_id: ProductId) -> Result<Product, ServiceError> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))
    }

    /// Change the list price. Placed orders keep their snapshot.
    #[instrument(skip(self), err)]
    pub async fn update_price(&self, product_id: ProductId, price: Money) -> Result<Product, ServiceError> {
        self.get(product_id).await?;
        self.catalog.update_price(product_id, price).await?;
        self.get(product_id).await
    }

    /// Add units through the compare-and-swap increment.
    #[instrument(skip(self), err)]
    pub async fn restock(&self, product_id: ProductId, quantity: u32) -> Result<Product, ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::Validation("quantity must be at least 1".to_string()));
        }
        let stock = self.guard.release(product_id, quantity).await?;
        info!(product_id = %product_id, quantity, stock, "product restocked");
        self.get(product_id).await
    }

    /// Reviews of an existing product, oldest first.
    pub async fn reviews(&self, product_id: ProductId) -> Result<Vec<Review>, ServiceError> {
        self.get(product_id).await?;
        Ok(self.reviews.reviews_for_product(product_id).await?)
    }
}
