//! `PostgreSQL` order repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use intershop_core::{
    ItemId, NewOrder, NewOrderLine, Order, OrderId, OrderLine, OrderLineId, OwnerId, Price,
};

use super::{OrderRepository, RepositoryError, quantity_from_db, quantity_to_db};

/// Row shape of `intershop.orders`.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    owner_id: String,
    created_at: DateTime<Utc>,
    total_price: Decimal,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let owner = OwnerId::parse(&row.owner_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid owner id in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            owner,
            created_at: row.created_at,
            total_price: Price::new(row.total_price),
        })
    }
}

/// Row shape of `intershop.order_line`.
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: i64,
    order_id: i64,
    item_id: i64,
    quantity: i32,
    price_per_item: Decimal,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            item_id: ItemId::new(row.item_id),
            quantity: quantity_from_db(row.quantity)?,
            price_per_item: Price::new(row.price_per_item),
        })
    }
}

/// Repository for orders and order lines.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn save(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO intershop.orders (owner_id, created_at, total_price)
            VALUES ($1, $2, $3)
            RETURNING id, owner_id, created_at, total_price
            ",
        )
        .bind(order.owner.as_str())
        .bind(order.created_at)
        .bind(order.total_price.amount())
        .fetch_one(&self.pool)
        .await?;

        Order::try_from(row)
    }

    async fn save_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(lines.len());

        for line in lines {
            let row = sqlx::query_as::<_, OrderLineRow>(
                r"
                INSERT INTO intershop.order_line (order_id, item_id, quantity, price_per_item)
                VALUES ($1, $2, $3, $4)
                RETURNING id, order_id, item_id, quantity, price_per_item
                ",
            )
            .bind(order_id.as_i64())
            .bind(line.item_id.as_i64())
            .bind(quantity_to_db(line.quantity)?)
            .bind(line.price_per_item.amount())
            .fetch_one(&mut *tx)
            .await?;

            saved.push(OrderLine::try_from(row)?);
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete(&self, order_id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM intershop.orders
            WHERE id = $1
            ",
        )
        .bind(order_id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, owner_id, created_at, total_price
            FROM intershop.orders
            WHERE id = $1
            ",
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, owner_id, created_at, total_price
            FROM intershop.orders
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn find_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, item_id, quantity, price_per_item
            FROM intershop.order_line
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderLine::try_from).collect()
    }
}
