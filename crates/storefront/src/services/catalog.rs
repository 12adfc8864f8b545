//! Item lookup and catalog search.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use intershop_core::{Item, ItemId, OwnerId, Paging, SortMode, tile};

use crate::cache::{CacheCoordinator, SearchKey};
use crate::db::{CartRepository, ItemRepository};

use super::ShopError;
use super::cart::{cached_item, cached_line};

/// Default number of items per search page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Search parameters as accepted from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Substring to match against title or description.
    pub search: String,
    /// Result ordering.
    pub sort: SortMode,
    /// 1-based page number.
    pub page_number: u32,
    /// Items per page.
    pub page_size: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort: SortMode::No,
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchQuery {
    /// Clamp page number to at least 1 and page size to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page_number = self.page_number.max(1);
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

/// One rendered search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    /// Query text as submitted.
    pub search: String,
    /// Applied ordering.
    pub sort: SortMode,
    /// Paging flags.
    pub paging: Paging,
    /// Items in rows of three, decorated with the viewer's cart quantity.
    pub rows: Vec<Vec<Item>>,
    /// Number of matching items across all pages.
    pub total_count: u64,
}

/// Read-only catalog access, decorated per viewer.
#[derive(Clone)]
pub struct ItemCatalog {
    items: Arc<dyn ItemRepository>,
    carts: Arc<dyn CartRepository>,
    cache: CacheCoordinator,
}

impl ItemCatalog {
    /// Create a new catalog service.
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemRepository>,
        carts: Arc<dyn CartRepository>,
        cache: CacheCoordinator,
    ) -> Self {
        Self {
            items,
            carts,
            cache,
        }
    }

    /// Get one item with `count` set to the viewer's cart quantity.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::ItemNotFound` if the item does not exist, or
    /// `ShopError::Repository` if the store fails.
    #[instrument(skip(self, viewer), fields(item_id = %id))]
    pub async fn get_item(&self, id: ItemId, viewer: Option<&OwnerId>) -> Result<Item, ShopError> {
        let item = cached_item(&self.cache, self.items.as_ref(), id)
            .await?
            .ok_or(ShopError::ItemNotFound(id))?;
        self.decorate(item, viewer).await
    }

    /// Run a search and tile the page into rows of three.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the store fails.
    #[instrument(skip(self, viewer), fields(search = %query.search, sort = query.sort.as_str()))]
    pub async fn search(
        &self,
        query: SearchQuery,
        viewer: Option<&OwnerId>,
    ) -> Result<SearchPage, ShopError> {
        let query = query.normalized();
        let key = SearchKey::new(&query.search, query.sort, query.page_number, query.page_size);
        let paging = Paging::new(query.page_number, query.page_size, 0);

        let page = self
            .cache
            .search_page(key, || {
                self.items
                    .search(&query.search, query.sort, paging.offset(), query.page_size)
            })
            .await?;

        let mut decorated = Vec::with_capacity(page.items.len());
        for item in page.items {
            decorated.push(self.decorate(item, viewer).await?);
        }

        Ok(SearchPage {
            search: query.search,
            sort: query.sort,
            paging: Paging::new(query.page_number, query.page_size, page.total_count),
            rows: tile(&decorated),
            total_count: page.total_count,
        })
    }

    async fn decorate(&self, item: Item, viewer: Option<&OwnerId>) -> Result<Item, ShopError> {
        let Some(owner) = viewer else {
            return Ok(item);
        };

        let count = cached_line(&self.cache, self.carts.as_ref(), owner, item.id)
            .await?
            .map_or(0, |line| line.quantity);
        Ok(Item { count, ..item })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use intershop_core::{CartAction, Price};

    use super::*;
    use crate::services::fixtures::{Fixture, owner};

    fn query(search: &str, sort: SortMode, page_number: u32, page_size: u32) -> SearchQuery {
        SearchQuery {
            search: search.to_owned(),
            sort,
            page_number,
            page_size,
        }
    }

    #[test]
    fn test_normalized_clamps() {
        let q = query("", SortMode::No, 0, 0).normalized();
        assert_eq!((q.page_number, q.page_size), (1, 1));

        let q = query("", SortMode::No, 3, 5000).normalized();
        assert_eq!((q.page_number, q.page_size), (3, MAX_PAGE_SIZE));
    }

    #[tokio::test]
    async fn test_blank_query_matches_all_in_id_order() {
        let fx = Fixture::new().await;

        let page = fx.catalog.search(query("  ", SortMode::No, 1, 10), None).await.unwrap();

        assert_eq!(page.total_count, 3);
        let ids: Vec<_> = page.rows.concat().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![fx.ball, fx.lamp, fx.mug]);
    }

    #[tokio::test]
    async fn test_search_matches_title_or_description_case_insensitive() {
        let fx = Fixture::new().await;

        let page = fx.catalog.search(query("LIGHT", SortMode::No, 1, 10), None).await.unwrap();
        let ids: Vec<_> = page.rows.concat().iter().map(|i| i.id).collect();

        // "Lamp" matches by description only.
        assert_eq!(ids, vec![fx.lamp]);
    }

    #[tokio::test]
    async fn test_sort_modes() {
        let fx = Fixture::new().await;

        let by_title = fx.catalog.search(query("", SortMode::Alpha, 1, 10), None).await.unwrap();
        let titles: Vec<_> = by_title.rows.concat().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["Ball", "Lamp", "Mug"]);

        let by_price = fx.catalog.search(query("", SortMode::Price, 1, 10), None).await.unwrap();
        let prices: Vec<_> = by_price.rows.concat().into_iter().map(|i| i.price).collect();
        assert_eq!(
            prices,
            vec![Price::from_cents(450), Price::from_cents(1000), Price::from_cents(2550)]
        );
    }

    #[tokio::test]
    async fn test_paging_flags() {
        let fx = Fixture::new().await;

        let first = fx.catalog.search(query("", SortMode::No, 1, 2), None).await.unwrap();
        assert!(first.paging.has_next);
        assert!(!first.paging.has_previous);
        assert_eq!(first.rows.concat().len(), 2);

        let second = fx.catalog.search(query("", SortMode::No, 2, 2), None).await.unwrap();
        assert!(!second.paging.has_next);
        assert!(second.paging.has_previous);
        assert_eq!(second.rows.concat().len(), 1);
    }

    #[tokio::test]
    async fn test_seven_items_tile_three_three_one() {
        let fx = Fixture::new().await;
        for n in 0..4 {
            fx.store
                .insert_item(&format!("Extra {n}"), "filler", "x.jpg", Price::from_cents(100), 1)
                .await;
        }

        let page = fx.catalog.search(query("", SortMode::No, 1, 10), None).await.unwrap();

        let widths: Vec<_> = page.rows.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![3, 3, 1]);
        assert_eq!(page.rows[0][0].id, fx.ball);
    }

    #[tokio::test]
    async fn test_search_pages_are_cached_and_viewer_independent() {
        let fx = Fixture::new().await;
        let alice = owner("alice");
        fx.carts.mutate(&alice, fx.ball, CartAction::Plus).await.unwrap();

        let anonymous = fx.catalog.search(SearchQuery::default(), None).await.unwrap();
        let viewed = fx.catalog.search(SearchQuery::default(), Some(&alice)).await.unwrap();

        assert_eq!(fx.store.read_counts().searches, 1);
        assert_eq!(anonymous.rows[0][0].count, 0);
        assert_eq!(viewed.rows[0][0].count, 1);
    }

    #[tokio::test]
    async fn test_get_item_decorates_for_viewer() {
        let fx = Fixture::new().await;
        let alice = owner("alice");
        fx.carts.mutate(&alice, fx.lamp, CartAction::Plus).await.unwrap();
        fx.carts.mutate(&alice, fx.lamp, CartAction::Plus).await.unwrap();

        assert_eq!(fx.catalog.get_item(fx.lamp, Some(&alice)).await.unwrap().count, 2);
        assert_eq!(fx.catalog.get_item(fx.lamp, Some(&owner("bob"))).await.unwrap().count, 0);
        assert_eq!(fx.catalog.get_item(fx.lamp, None).await.unwrap().count, 0);

        // Decoration never leaks into the cached item.
        assert_eq!(fx.store.read_counts().item_lookups, 1);
    }

    #[tokio::test]
    async fn test_get_item_not_found() {
        let fx = Fixture::new().await;
        let result = fx.catalog.get_item(ItemId::new(404), None).await;
        assert!(matches!(result, Err(ShopError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_decoration_follows_cart_mutations() {
        let fx = Fixture::new().await;
        let alice = owner("alice");

        assert_eq!(fx.catalog.get_item(fx.mug, Some(&alice)).await.unwrap().count, 0);
        fx.carts.mutate(&alice, fx.mug, CartAction::Plus).await.unwrap();
        assert_eq!(fx.catalog.get_item(fx.mug, Some(&alice)).await.unwrap().count, 1);
    }
}
