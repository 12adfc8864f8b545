//! `PostgreSQL` cart line repository.
//!
//! Increments are single upserts. Decrements and order conversion read the
//! line `FOR UPDATE` inside a transaction, so concurrent mutations for the
//! same (owner, item) serialize on the row lock.

use async_trait::async_trait;
use sqlx::PgPool;

use intershop_core::{CartLine, CartLineId, ItemId, OwnerId};

use super::{CartRepository, RepositoryError, quantity_from_db, quantity_to_db};

/// Row shape of `intershop.cart_line`.
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i64,
    owner_id: String,
    item_id: i64,
    quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let owner = OwnerId::parse(&row.owner_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid owner id in database: {e}"))
        })?;

        Ok(Self {
            id: CartLineId::new(row.id),
            owner,
            item_id: ItemId::new(row.item_id),
            quantity: quantity_from_db(row.quantity)?,
        })
    }
}

/// Map foreign-key violations (unknown item) to `NotFound`.
fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}

/// Repository for cart lines.
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn find_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, owner_id, item_id, quantity
            FROM intershop.cart_line
            WHERE owner_id = $1 AND item_id = $2
            ",
        )
        .bind(owner.as_str())
        .bind(item_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn list_lines(&self, owner: &OwnerId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, owner_id, item_id, quantity
            FROM intershop.cart_line
            WHERE owner_id = $1
            ORDER BY item_id
            ",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn upsert_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<CartLine, RepositoryError> {
        if quantity == 0 {
            return Err(RepositoryError::Conflict(
                "cart line quantity must be positive".to_owned(),
            ));
        }

        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            INSERT INTO intershop.cart_line (owner_id, item_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, item_id) DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING id, owner_id, item_id, quantity
            ",
        )
        .bind(owner.as_str())
        .bind(item_id.as_i64())
        .bind(quantity_to_db(quantity)?)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        CartLine::try_from(row)
    }

    async fn increment_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<CartLine, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            INSERT INTO intershop.cart_line (owner_id, item_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT (owner_id, item_id)
                DO UPDATE SET quantity = intershop.cart_line.quantity + 1
            RETURNING id, owner_id, item_id, quantity
            ",
        )
        .bind(owner.as_str())
        .bind(item_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        CartLine::try_from(row)
    }

    async fn decrement_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        // The row lock serializes concurrent decrements of the same line.
        let mut tx = self.pool.begin().await?;

        let current: Option<i32> = sqlx::query_scalar(
            r"
            SELECT quantity FROM intershop.cart_line
            WHERE owner_id = $1 AND item_id = $2
            FOR UPDATE
            ",
        )
        .bind(owner.as_str())
        .bind(item_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        let row = match current {
            None => None,
            Some(quantity) if quantity <= 1 => {
                sqlx::query(
                    r"
                    DELETE FROM intershop.cart_line
                    WHERE owner_id = $1 AND item_id = $2
                    ",
                )
                .bind(owner.as_str())
                .bind(item_id.as_i64())
                .execute(&mut *tx)
                .await?;
                None
            }
            Some(_) => Some(
                sqlx::query_as::<_, CartLineRow>(
                    r"
                    UPDATE intershop.cart_line
                    SET quantity = quantity - 1
                    WHERE owner_id = $1 AND item_id = $2
                    RETURNING id, owner_id, item_id, quantity
                    ",
                )
                .bind(owner.as_str())
                .bind(item_id.as_i64())
                .fetch_one(&mut *tx)
                .await?,
            ),
        };

        tx.commit().await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn delete_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM intershop.cart_line
            WHERE owner_id = $1 AND item_id = $2
            ",
        )
        .bind(owner.as_str())
        .bind(item_id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_lines(&self, owner: &OwnerId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM intershop.cart_line
            WHERE owner_id = $1
            ",
        )
        .bind(owner.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn remove_quantities(
        &self,
        owner: &OwnerId,
        lines: &[(ItemId, u32)],
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;

        for &(item_id, quantity) in lines {
            let current: Option<i32> = sqlx::query_scalar(
                r"
                SELECT quantity FROM intershop.cart_line
                WHERE owner_id = $1 AND item_id = $2
                FOR UPDATE
                ",
            )
            .bind(owner.as_str())
            .bind(item_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;

            let Some(current) = current else { continue };

            if current <= quantity_to_db(quantity)? {
                sqlx::query(
                    r"
                    DELETE FROM intershop.cart_line
                    WHERE owner_id = $1 AND item_id = $2
                    ",
                )
                .bind(owner.as_str())
                .bind(item_id.as_i64())
                .execute(&mut *tx)
                .await?;
                removed += 1;
            } else {
                sqlx::query(
                    r"
                    UPDATE intershop.cart_line
                    SET quantity = quantity - $3
                    WHERE owner_id = $1 AND item_id = $2
                    ",
                )
                .bind(owner.as_str())
                .bind(item_id.as_i64())
                .bind(quantity_to_db(quantity)?)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok(removed)
    }
}
