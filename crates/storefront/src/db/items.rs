//! `PostgreSQL` catalog repository.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use intershop_core::{Item, ItemId, OrderId, OrderedItem, Price, SortMode};

use super::{CatalogPage, ItemRepository, RepositoryError, quantity_from_db};

/// Row shape of `intershop.item`.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    title: String,
    description: String,
    img_path: String,
    price: Decimal,
    stock_count: i32,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: ItemId::new(row.id),
            title: row.title,
            description: row.description,
            img_path: row.img_path,
            price: Price::new(row.price),
            stock_count: row.stock_count,
            count: 0,
        }
    }
}

/// Row shape of the order-items join.
#[derive(Debug, sqlx::FromRow)]
struct OrderedItemRow {
    item_id: i64,
    title: String,
    img_path: String,
    quantity: i32,
    price_per_item: Decimal,
}

/// Repository for catalog items.
#[derive(Clone)]
pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `ORDER BY` clause for a sort mode. Never built from user input.
const fn order_clause(sort: SortMode) -> &'static str {
    match sort {
        SortMode::No => "ORDER BY id",
        SortMode::Alpha => "ORDER BY title, id",
        SortMode::Price => "ORDER BY price, id",
    }
}

/// Build a `LIKE` pattern matching `query` as a literal substring.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const SEARCH_FILTER: &str = r"
    WHERE $1 = ''
       OR lower(title) LIKE $2 ESCAPE '\'
       OR lower(description) LIKE $2 ESCAPE '\'
";

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn find_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT id, title, description, img_path, price, stock_count
            FROM intershop.item
            WHERE id = $1
            ",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    async fn search(
        &self,
        query: &str,
        sort: SortMode,
        offset: u64,
        limit: u32,
    ) -> Result<CatalogPage, RepositoryError> {
        let trimmed = query.trim();
        let pattern = like_pattern(trimmed);
        let offset = i64::try_from(offset)
            .map_err(|_| RepositoryError::Conflict(format!("offset {offset} too large")))?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM intershop.item {SEARCH_FILTER}"
        ))
        .bind(trimmed)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r"
            SELECT id, title, description, img_path, price, stock_count
            FROM intershop.item
            {SEARCH_FILTER}
            {}
            LIMIT $3 OFFSET $4
            ",
            order_clause(sort)
        ))
        .bind(trimmed)
        .bind(&pattern)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(CatalogPage {
            items: rows.into_iter().map(Item::from).collect(),
            total_count: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn find_by_order_id(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderedItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderedItemRow>(
            r"
            SELECT ol.item_id, i.title, i.img_path, ol.quantity, ol.price_per_item
            FROM intershop.order_line ol
            JOIN intershop.item i ON i.id = ol.item_id
            WHERE ol.order_id = $1
            ORDER BY ol.id
            ",
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderedItem {
                    item_id: ItemId::new(row.item_id),
                    title: row.title,
                    img_path: row.img_path,
                    quantity: quantity_from_db(row.quantity)?,
                    price_per_item: Price::new(row.price_per_item),
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
