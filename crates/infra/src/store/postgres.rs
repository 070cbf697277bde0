//! Postgres-backed store adapters.
//!
//! Conditional writes are single `UPDATE ... WHERE <column> = <expected>`
//! statements, so the row lock taken by the update makes compare and swap
//! atomic without an explicit transaction.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Conflict` |
//! | Database (other) | any other | `Unavailable` |
//! | PoolClosed / Io / other | N/A | `Unavailable` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use orderkit_core::{AggregateRoot, ExpectedVersion, Money, OrderId, ProductId, ReviewId, UserId};
use orderkit_inventory::Product;
use orderkit_orders::{Cart, CartLine, Contact, Order, OrderLine, OrderStatus};
use orderkit_reviews::{Rating, Review, ReviewSummary};

use super::{CartStore, CasOutcome, OrderStore, ProductCatalog, ProductStock, ReviewStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// One pool, every port.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn load_lines(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, name, quantity, price_cents, is_reviewed
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_lines", e))?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = get(&row, "order_id")?;
            let quantity: i32 = get(&row, "quantity")?;
            lines.entry(order_id).or_default().push(OrderLine {
                product_id: ProductId::from_uuid(get(&row, "product_id")?),
                name: get(&row, "name")?,
                quantity: u32::try_from(quantity).map_err(|_| corrupt("quantity"))?,
                price: money(get(&row, "price_cents")?)?,
                is_reviewed: get(&row, "is_reviewed")?,
            });
        }
        Ok(lines)
    }

    async fn hydrate_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| get::<Uuid>(r, "id"))
            .collect::<Result<_, _>>()?;
        let mut lines = self.load_lines(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let id: Uuid = get(&row, "id")?;
                let status: String = get(&row, "status")?;
                let version: i64 = get(&row, "version")?;
                Ok(Order::from_parts(
                    OrderId::from_uuid(id),
                    UserId::from_uuid(get(&row, "user_id")?),
                    Contact {
                        name: get(&row, "contact_name")?,
                        email: get(&row, "contact_email")?,
                    },
                    status.parse::<OrderStatus>().map_err(|_| corrupt("status"))?,
                    lines.remove(&id).unwrap_or_default(),
                    money(get(&row, "total_price_cents")?)?,
                    get(&row, "created_at")?,
                    u64::try_from(version).map_err(|_| corrupt("version"))?,
                ))
            })
            .collect()
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, contact_name, contact_email, status, total_price_cents, created_at, version";

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Serialization(format!("column {column}: {e}")))
}

fn corrupt(what: &str) -> StoreError {
    StoreError::Serialization(format!("invalid stored {what}"))
}

fn money(cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| corrupt("amount"))
}

fn cents(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.cents()).map_err(|_| StoreError::Serialization("amount too large".to_string()))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let num_reviews: i32 = get(row, "num_reviews")?;
    Ok(Product {
        id: ProductId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        price: money(get(row, "price_cents")?)?,
        stock: get(row, "stock")?,
        rating: get(row, "rating")?,
        num_reviews: u32::try_from(num_reviews).map_err(|_| corrupt("num_reviews"))?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review, StoreError> {
    let rating: i16 = get(row, "rating")?;
    Ok(Review::from_parts(
        ReviewId::from_uuid(get(row, "id")?),
        ProductId::from_uuid(get(row, "product_id")?),
        OrderId::from_uuid(get(row, "order_id")?),
        UserId::from_uuid(get(row, "user_id")?),
        get(row, "name")?,
        Rating::try_from(i64::from(rating)).map_err(|_| corrupt("rating"))?,
        get(row, "comment")?,
        get(row, "created_at")?,
        get(row, "updated_at")?,
    ))
}

#[async_trait]
impl ProductStock for PostgresStore {
    #[instrument(skip(self), err)]
    async fn read_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("read_stock", e))?
            .ok_or(StoreError::NotFound("product"))?;
        get(&row, "stock")
    }

    #[instrument(skip(self), err)]
    async fn compare_and_swap_stock(
        &self,
        product_id: ProductId,
        expected: i64,
        new: i64,
    ) -> Result<CasOutcome<i64>, StoreError> {
        if new < 0 {
            return Err(StoreError::Conflict(format!("stock cannot become {new}")));
        }

        let swapped = sqlx::query("UPDATE products SET stock = $3 WHERE id = $1 AND stock = $2 RETURNING stock")
            .bind(product_id.as_uuid())
            .bind(expected)
            .bind(new)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("compare_and_swap_stock", e))?;

        match swapped {
            Some(row) => Ok(CasOutcome::Applied(get(&row, "stock")?)),
            None => Ok(CasOutcome::Stale {
                actual: self.read_stock(product_id).await?,
            }),
        }
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    #[instrument(skip(self), err)]
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, stock, rating, num_reviews FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, name, price_cents, stock, rating, num_reviews FROM products WHERE id = ANY($1)",
        )
        .bind(&uuids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock, rating, num_reviews)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(cents(product.price)?)
        .bind(product.stock)
        .bind(product.rating)
        .bind(i32::try_from(product.num_reviews).unwrap_or(i32::MAX))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn update_price(&self, product_id: ProductId, price: Money) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET price_cents = $2 WHERE id = $1")
            .bind(product_id.as_uuid())
            .bind(cents(price)?)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_price", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("product"));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn load_cart(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query("SELECT user_id, lines, version FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_cart", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(lines): Json<Vec<CartLine>> = get(&row, "lines")?;
        let version: i64 = get(&row, "version")?;
        Ok(Some(Cart::from_parts(
            user_id,
            lines,
            u64::try_from(version).map_err(|_| corrupt("version"))?,
        )))
    }

    #[instrument(skip(self, cart), fields(user_id = %cart.user_id()), err)]
    async fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> Result<(), StoreError> {
        let new_version = i64::try_from(cart.version()).map_err(|_| corrupt("version"))?;
        let lines = Json(cart.lines().to_vec());

        let affected = match expected {
            ExpectedVersion::Any => sqlx::query(
                r#"
                INSERT INTO carts (user_id, lines, version) VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO UPDATE SET lines = EXCLUDED.lines, version = EXCLUDED.version
                "#,
            )
            .bind(cart.user_id().as_uuid())
            .bind(lines)
            .bind(new_version)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("save_cart", e))?
            .rows_affected(),
            ExpectedVersion::Exact(0) => sqlx::query(
                r#"
                INSERT INTO carts (user_id, lines, version) VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO UPDATE SET lines = EXCLUDED.lines, version = EXCLUDED.version
                WHERE carts.version = 0
                "#,
            )
            .bind(cart.user_id().as_uuid())
            .bind(lines)
            .bind(new_version)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("save_cart", e))?
            .rows_affected(),
            ExpectedVersion::Exact(v) => {
                let v = i64::try_from(v).map_err(|_| corrupt("version"))?;
                sqlx::query("UPDATE carts SET lines = $2, version = $3 WHERE user_id = $1 AND version = $4")
                    .bind(cart.user_id().as_uuid())
                    .bind(lines)
                    .bind(new_version)
                    .bind(v)
                    .execute(&*self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("save_cart", e))?
                    .rows_affected()
            }
        };

        if affected == 0 {
            return Err(StoreError::Conflict(format!(
                "cart version: expected {expected:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, contact_name, contact_email, status, total_price_cents, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(&order.contact().name)
        .bind(&order.contact().email)
        .bind(order.status().as_str())
        .bind(cents(order.total_price())?)
        .bind(order.created_at())
        .bind(i64::try_from(order.version()).map_err(|_| corrupt("version"))?)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (position, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines
                    (order_id, position, product_id, name, quantity, price_cents, is_reviewed)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id_typed().as_uuid())
            .bind(i32::try_from(position).map_err(|_| corrupt("position"))?)
            .bind(line.product_id.as_uuid())
            .bind(&line.name)
            .bind(i32::try_from(line.quantity).map_err(|_| corrupt("quantity"))?)
            .bind(cents(line.price)?)
            .bind(line.is_reviewed)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        Ok(self.hydrate_orders(rows).await?.into_iter().next())
    }

    #[instrument(skip(self), err)]
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders_for_user", e))?;

        self.hydrate_orders(rows).await
    }

    #[instrument(skip(self), err)]
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        self.hydrate_orders(rows).await
    }

    #[instrument(skip(self), err)]
    async fn list_orders_created_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at ASC"
        ))
        .bind(from)
        .bind(until)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders_created_between", e))?;

        self.hydrate_orders(rows).await
    }

    #[instrument(skip(self), err)]
    async fn compare_and_set_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<CasOutcome<Order>, StoreError> {
        let swapped = sqlx::query(
            "UPDATE orders SET status = $3, version = version + 1 WHERE id = $1 AND status = $2 RETURNING id",
        )
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(new.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("compare_and_set_status", e))?;

        let current = self
            .get_order(order_id)
            .await?
            .ok_or(StoreError::NotFound("order"))?;

        if swapped.is_some() {
            Ok(CasOutcome::Applied(current))
        } else {
            Ok(CasOutcome::Stale { actual: current })
        }
    }

    #[instrument(skip(self), err)]
    async fn set_line_reviewed(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        expected: bool,
        new: bool,
    ) -> Result<CasOutcome<bool>, StoreError> {
        let swapped = sqlx::query(
            r#"
            UPDATE order_lines SET is_reviewed = $4
            WHERE order_id = $1 AND product_id = $2 AND is_reviewed = $3
            RETURNING is_reviewed
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(expected)
        .bind(new)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_line_reviewed", e))?;

        if let Some(row) = swapped {
            return Ok(CasOutcome::Applied(get(&row, "is_reviewed")?));
        }

        let current = sqlx::query("SELECT is_reviewed FROM order_lines WHERE order_id = $1 AND product_id = $2")
            .bind(order_id.as_uuid())
            .bind(product_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_line_reviewed", e))?;

        match current {
            Some(row) => Ok(CasOutcome::Stale {
                actual: get(&row, "is_reviewed")?,
            }),
            None if self.get_order(order_id).await?.is_none() => Err(StoreError::NotFound("order")),
            None => Err(StoreError::NotFound("order line")),
        }
    }
}

const REVIEW_COLUMNS: &str =
    "id, product_id, order_id, user_id, name, rating, comment, created_at, updated_at";

#[async_trait]
impl ReviewStore for PostgresStore {
    #[instrument(skip(self, review), fields(review_id = %review.id_typed()), err)]
    async fn insert_review(&self, review: &Review) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reviews
                (id, product_id, order_id, user_id, name, rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(review.id_typed().as_uuid())
        .bind(review.product_id().as_uuid())
        .bind(review.order_id().as_uuid())
        .bind(review.user_id().as_uuid())
        .bind(review.name())
        .bind(i16::from(review.rating().value()))
        .bind(review.comment())
        .bind(review.created_at())
        .bind(review.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_review", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_review(&self, review_id: ReviewId) -> Result<Option<Review>, StoreError> {
        let row = sqlx::query(&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"))
            .bind(review_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_review", e))?;

        row.as_ref().map(review_from_row).transpose()
    }

    #[instrument(skip(self, review), fields(review_id = %review.id_typed()), err)]
    async fn update_review(&self, review: &Review) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE reviews SET rating = $2, comment = $3, updated_at = $4 WHERE id = $1")
            .bind(review.id_typed().as_uuid())
            .bind(i16::from(review.rating().value()))
            .bind(review.comment())
            .bind(review.updated_at())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_review", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("review"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_review(&self, review_id: ReviewId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_review", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn reviews_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reviews_for_product", e))?;

        rows.iter().map(review_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn refresh_product_summary(&self, product_id: ProductId) -> Result<ReviewSummary, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("refresh_product_summary", e))?;

        // Row lock first; the UPDATE below then reads reviews with a fresh
        // snapshot taken after any earlier refresh has committed.
        let locked = sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("refresh_product_summary", e))?;
        if locked.is_none() {
            return Err(StoreError::NotFound("product"));
        }

        let row = sqlx::query(
            r#"
            UPDATE products SET
                rating = COALESCE((SELECT AVG(rating)::float8 FROM reviews WHERE product_id = $1), 0),
                num_reviews = (SELECT COUNT(*)::int4 FROM reviews WHERE product_id = $1)
            WHERE id = $1
            RETURNING rating, num_reviews
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("refresh_product_summary", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("refresh_product_summary", e))?;

        let num_reviews: i32 = get(&row, "num_reviews")?;
        Ok(ReviewSummary {
            rating: get(&row, "rating")?,
            num_reviews: u32::try_from(num_reviews).map_err(|_| corrupt("num_reviews"))?,
        })
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
