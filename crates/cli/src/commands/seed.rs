//! Seed the catalog with the demo items.
//!
//! Items are matched by title, so running the command twice inserts nothing
//! the second time.

use intershop_storefront::db::{self, seed};
use tracing::info;

use super::{CommandError, database_url};

/// Insert the demo catalog into the storefront database.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails or
/// an insert fails.
pub async fn demo_catalog() -> Result<(), CommandError> {
    let url = database_url()?;
    let pool = db::create_pool(&url).await?;

    let inserted = seed::seed_postgres(&pool).await?;
    info!(
        inserted,
        available = seed::DEMO_ITEMS.len(),
        "Demo catalog seeded"
    );
    Ok(())
}
