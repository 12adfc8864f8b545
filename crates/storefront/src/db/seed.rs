//! Demo catalog used by `intershop-cli seed` and the in-memory development mode.

use sqlx::PgPool;

use intershop_core::Price;

use super::{InMemoryStore, RepositoryError};

/// A catalog entry to seed.
#[derive(Debug, Clone, Copy)]
pub struct DemoItem {
    pub title: &'static str,
    pub description: &'static str,
    pub img_path: &'static str,
    pub price_cents: i64,
    pub stock_count: i32,
}

/// The demo catalog.
pub const DEMO_ITEMS: &[DemoItem] = &[
    DemoItem {
        title: "Ball",
        description: "Red rubber ball",
        img_path: "images/ball.jpg",
        price_cents: 1000,
        stock_count: 50,
    },
    DemoItem {
        title: "Desk Lamp",
        description: "Adjustable reading light",
        img_path: "images/lamp.jpg",
        price_cents: 2550,
        stock_count: 12,
    },
    DemoItem {
        title: "Mug",
        description: "Ceramic coffee mug",
        img_path: "images/mug.jpg",
        price_cents: 450,
        stock_count: 80,
    },
    DemoItem {
        title: "Notebook",
        description: "Dotted A5 notebook",
        img_path: "images/notebook.jpg",
        price_cents: 790,
        stock_count: 40,
    },
    DemoItem {
        title: "Backpack",
        description: "Waterproof city backpack",
        img_path: "images/backpack.jpg",
        price_cents: 8900,
        stock_count: 7,
    },
    DemoItem {
        title: "Headphones",
        description: "Wireless noise cancelling headphones",
        img_path: "images/headphones.jpg",
        price_cents: 19_900,
        stock_count: 5,
    },
    DemoItem {
        title: "Umbrella",
        description: "Compact travel umbrella",
        img_path: "images/umbrella.jpg",
        price_cents: 1590,
        stock_count: 25,
    },
];

/// Load the demo catalog into an in-memory store.
pub async fn seed_memory(store: &InMemoryStore) {
    for item in DEMO_ITEMS {
        store
            .insert_item(
                item.title,
                item.description,
                item.img_path,
                Price::from_cents(item.price_cents),
                item.stock_count,
            )
            .await;
    }
}

/// Insert the demo catalog items that are not already present (by title).
///
/// Returns the number of items inserted.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn seed_postgres(pool: &PgPool) -> Result<u64, RepositoryError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for item in DEMO_ITEMS {
        let result = sqlx::query(
            r"
            INSERT INTO intershop.item (title, description, img_path, price, stock_count)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM intershop.item WHERE title = $1)
            ",
        )
        .bind(item.title)
        .bind(item.description)
        .bind(item.img_path)
        .bind(Price::from_cents(item.price_cents).amount())
        .bind(item.stock_count)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}
