use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderkit_core::AggregateRoot;
use orderkit_inventory::Product;
use orderkit_orders::{Cart, DailySales, Order};
use orderkit_reviews::Review;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesQuery {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: u64,
    #[serde(default)]
    pub stock: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePriceRequest {
    pub price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub order_id: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub subtotal: String,
    pub is_reviewed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: &'static str,
    pub total_price: String,
    pub lines: Vec<OrderLineResponse>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id_typed().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status().as_str(),
            total_price: order.total_price().to_string(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    product_id: line.product_id.to_string(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    price: line.price.to_string(),
                    subtotal: line.subtotal().map(|m| m.to_string()).unwrap_or_default(),
                    is_reviewed: line.is_reviewed,
                })
                .collect(),
            created_at: order.created_at(),
            version: order.version(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub user_id: String,
    pub items: Vec<CartItemResponse>,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            user_id: cart.user_id().to_string(),
            items: cart
                .lines()
                .iter()
                .map(|l| CartItemResponse {
                    product_id: l.product_id.to_string(),
                    quantity: l.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price: String,
    pub price_cents: u64,
    pub stock: i64,
    pub rating: f64,
    pub num_reviews: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewResponse>>,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            price: p.price.to_string(),
            price_cents: p.price.cents(),
            stock: p.stock,
            rating: p.rating,
            num_reviews: p.num_reviews,
            reviews: None,
        }
    }
}

impl ProductResponse {
    pub fn with_reviews(mut self, reviews: &[Review]) -> Self {
        self.reviews = Some(reviews.iter().map(ReviewResponse::from).collect());
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub product_id: String,
    pub order_id: String,
    pub user_id: String,
    pub name: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Review> for ReviewResponse {
    fn from(r: &Review) -> Self {
        Self {
            id: r.id_typed().to_string(),
            product_id: r.product_id().to_string(),
            order_id: r.order_id().to_string(),
            user_id: r.user_id().to_string(),
            name: r.name().to_string(),
            rating: r.rating().value(),
            comment: r.comment().to_string(),
            created_at: r.created_at(),
            updated_at: r.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesResponse {
    pub date: String,
    pub total_sales: String,
    pub order_count: u64,
}

impl From<&DailySales> for DailySalesResponse {
    fn from(d: &DailySales) -> Self {
        Self {
            date: d.date.format("%Y-%m-%d").to_string(),
            total_sales: d.total_sales.to_string(),
            order_count: d.order_count,
        }
    }
}
