//! Read-through cache over catalog and cart reads.
//!
//! Four namespaces, each a `moka` cache with a shared TTL:
//!
//! - items: `ItemId -> Item` (undecorated)
//! - search pages: `(query, sort, page, size) -> CatalogPage` (undecorated, owner-independent)
//! - cart summaries: `OwnerId -> CartSummary`
//! - cart lines: `(OwnerId, ItemId) -> Option<CartLine>`
//!
//! Writers never populate the cache; they only evict through the named
//! primitives below, after their store write has completed. Every namespace
//! carries an eviction epoch. A read-through load records the epoch before
//! reading the store and only keeps its result if no eviction happened in the
//! meantime, so a value superseded by a concurrent write is never cached.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use intershop_core::{CartLine, Item, ItemId, OwnerId, SortMode};

use crate::db::CatalogPage;
use crate::services::CartSummary;

/// Default time-to-live for every namespace.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default maximum number of entries per namespace.
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Key of a cached search page.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct SearchKey {
    /// Trimmed, lowercased query text.
    pub query: String,
    /// Sort mode.
    pub sort: SortMode,
    /// 1-based page number.
    pub page_number: u32,
    /// Page size.
    pub page_size: u32,
}

impl SearchKey {
    /// Build a key, normalizing the query so equivalent searches share an entry.
    #[must_use]
    pub fn new(query: &str, sort: SortMode, page_number: u32, page_size: u32) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            sort,
            page_number,
            page_size,
        }
    }
}

/// A single cache namespace with its eviction epoch.
struct Namespace<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: &'static str,
    cache: Cache<K, V>,
    epoch: AtomicU64,
}

impl<K, V> Namespace<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new(name: &'static str, ttl: Duration, max_capacity: u64, closures: bool) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity).time_to_live(ttl);
        if closures {
            builder = builder.support_invalidation_closures();
        }

        Self {
            name,
            cache: builder.build(),
            epoch: AtomicU64::new(0),
        }
    }

    async fn get_or_load<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.cache.get(&key).await {
            debug!(namespace = self.name, key = ?key, "Cache hit");
            return Ok(value);
        }
        debug!(namespace = self.name, key = ?key, "Cache miss");

        let epoch = self.epoch.load(Ordering::Acquire);
        let value = load().await?;

        if self.epoch.load(Ordering::Acquire) == epoch {
            self.cache.insert(key.clone(), value.clone()).await;
            // An eviction may have landed between the check and the insert.
            if self.epoch.load(Ordering::Acquire) != epoch {
                self.cache.invalidate(&key).await;
            }
        } else {
            debug!(namespace = self.name, key = ?key, "Skipping insert of superseded value");
        }

        Ok(value)
    }

    fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    async fn evict(&self, key: &K) {
        self.bump();
        self.cache.invalidate(key).await;
    }

    fn evict_where<P>(&self, predicate: P)
    where
        P: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        self.bump();
        if let Err(e) = self.cache.invalidate_entries_if(predicate) {
            // Closures not enabled for this namespace.
            warn!(namespace = self.name, error = %e, "Predicate eviction unsupported");
            self.cache.invalidate_all();
        }
    }

    fn evict_all(&self) {
        self.bump();
        self.cache.invalidate_all();
    }

    async fn peek(&self, key: &K) -> Option<V> {
        self.cache.get(key).await
    }
}

/// Keyed, TTL-bounded cache facade with explicit eviction primitives.
///
/// Cheap to clone; clones share the same caches.
#[derive(Clone)]
pub struct CacheCoordinator {
    inner: Arc<CacheCoordinatorInner>,
}

struct CacheCoordinatorInner {
    items: Namespace<ItemId, Item>,
    search_pages: Namespace<SearchKey, CatalogPage>,
    cart_summaries: Namespace<OwnerId, CartSummary>,
    cart_lines: Namespace<(OwnerId, ItemId), Option<CartLine>>,
}

impl CacheCoordinator {
    /// Create a coordinator whose namespaces share `ttl` and `max_capacity`.
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner: Arc::new(CacheCoordinatorInner {
                items: Namespace::new("items", ttl, max_capacity, false),
                search_pages: Namespace::new("search_pages", ttl, max_capacity, false),
                cart_summaries: Namespace::new("cart_summaries", ttl, max_capacity, false),
                cart_lines: Namespace::new("cart_lines", ttl, max_capacity, true),
            }),
        }
    }

    // =========================================================================
    // Read-through
    // =========================================================================

    /// Get an item, loading it on a miss. `None` results are not cached.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; nothing is cached on failure.
    pub async fn item<F, Fut, E>(&self, id: ItemId, load: F) -> Result<Option<Item>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Item>, E>>,
    {
        enum Missing<E> {
            Absent,
            Failed(E),
        }

        let loaded = self
            .inner
            .items
            .get_or_load(id, || async move {
                match load().await {
                    Ok(Some(item)) => Ok(item),
                    Ok(None) => Err(Missing::Absent),
                    Err(e) => Err(Missing::Failed(e)),
                }
            })
            .await;

        match loaded {
            Ok(item) => Ok(Some(item)),
            Err(Missing::Absent) => Ok(None),
            Err(Missing::Failed(e)) => Err(e),
        }
    }

    /// Get a search page, loading it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; nothing is cached on failure.
    pub async fn search_page<F, Fut, E>(&self, key: SearchKey, load: F) -> Result<CatalogPage, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CatalogPage, E>>,
    {
        self.inner.search_pages.get_or_load(key, load).await
    }

    /// Get an owner's cart summary, loading it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; nothing is cached on failure.
    pub async fn cart_summary<F, Fut, E>(&self, owner: &OwnerId, load: F) -> Result<CartSummary, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CartSummary, E>>,
    {
        self.inner.cart_summaries.get_or_load(owner.clone(), load).await
    }

    /// Get the cart line for (owner, item), loading it on a miss.
    ///
    /// Absence is cached too, so undecorated catalog views do not hit the
    /// store once per item.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; nothing is cached on failure.
    pub async fn cart_line<F, Fut, E>(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
        load: F,
    ) -> Result<Option<CartLine>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<CartLine>, E>>,
    {
        self.inner
            .cart_lines
            .get_or_load((owner.clone(), item_id), load)
            .await
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Evict the cached line for exactly (owner, item).
    pub async fn evict_cart_line(&self, owner: &OwnerId, item_id: ItemId) {
        debug!(owner = %owner, item_id = %item_id, "Evicting cart line");
        self.inner.cart_lines.evict(&(owner.clone(), item_id)).await;
    }

    /// Evict an owner's cached cart summary.
    pub async fn evict_cart_summary(&self, owner: &OwnerId) {
        debug!(owner = %owner, "Evicting cart summary");
        self.inner.cart_summaries.evict(owner).await;
    }

    /// Evict every cached cart line of one owner. Other owners are untouched.
    pub fn evict_owner_cart_lines(&self, owner: &OwnerId) {
        debug!(owner = %owner, "Evicting all cart lines of owner");
        let owner = owner.clone();
        self.inner
            .cart_lines
            .evict_where(move |(line_owner, _), _| *line_owner == owner);
    }

    /// Evict the whole search namespace.
    pub fn evict_search_pages(&self) {
        debug!("Evicting search pages");
        self.inner.search_pages.evict_all();
    }

    /// Evict a single cached item.
    pub async fn evict_item(&self, id: ItemId) {
        self.inner.items.evict(&id).await;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Whether (owner, item) currently has a cached line entry (present or absent).
    pub async fn has_cart_line(&self, owner: &OwnerId, item_id: ItemId) -> bool {
        self.inner
            .cart_lines
            .peek(&(owner.clone(), item_id))
            .await
            .is_some()
    }

    /// Whether an owner currently has a cached cart summary.
    pub async fn has_cart_summary(&self, owner: &OwnerId) -> bool {
        self.inner.cart_summaries.peek(owner).await.is_some()
    }
}

impl Default for CacheCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_CAPACITY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    use intershop_core::CartLineId;

    use super::*;

    fn owner(name: &str) -> OwnerId {
        OwnerId::parse(name).unwrap()
    }

    fn line(owner: &OwnerId, item: i64, quantity: u32) -> Option<CartLine> {
        Some(CartLine {
            id: CartLineId::new(item),
            owner: owner.clone(),
            item_id: ItemId::new(item),
            quantity,
        })
    }

    async fn fill(cache: &CacheCoordinator, owner: &OwnerId, item: i64) {
        let value = line(owner, item, 1);
        cache
            .cart_line(owner, ItemId::new(item), || async move {
                Ok::<_, Infallible>(value)
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hit_does_not_reload() {
        let cache = CacheCoordinator::default();
        let loads = AtomicUsize::new(0);
        let key = SearchKey::new("Ball", SortMode::No, 1, 10);

        for _ in 0..3 {
            cache
                .search_page(key.clone(), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(CatalogPage::default())
                })
                .await
                .unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_search_key_normalizes_query() {
        assert_eq!(
            SearchKey::new("  Ball ", SortMode::Alpha, 1, 5),
            SearchKey::new("ball", SortMode::Alpha, 1, 5)
        );
    }

    #[tokio::test]
    async fn test_evict_cart_line_is_exact() {
        let cache = CacheCoordinator::default();
        let a = owner("alice");
        let b = owner("bob");
        fill(&cache, &a, 5).await;
        fill(&cache, &a, 6).await;
        fill(&cache, &b, 5).await;

        cache.evict_cart_line(&a, ItemId::new(5)).await;

        assert!(!cache.has_cart_line(&a, ItemId::new(5)).await);
        assert!(cache.has_cart_line(&a, ItemId::new(6)).await);
        assert!(cache.has_cart_line(&b, ItemId::new(5)).await);
    }

    #[tokio::test]
    async fn test_evict_owner_cart_lines_is_owner_scoped() {
        let cache = CacheCoordinator::default();
        let a = owner("alice");
        let b = owner("bob");
        fill(&cache, &a, 5).await;
        fill(&cache, &a, 6).await;
        fill(&cache, &b, 5).await;

        cache.evict_owner_cart_lines(&a);

        assert!(!cache.has_cart_line(&a, ItemId::new(5)).await);
        assert!(!cache.has_cart_line(&a, ItemId::new(6)).await);
        assert!(cache.has_cart_line(&b, ItemId::new(5)).await);
    }

    #[tokio::test]
    async fn test_missing_item_is_not_cached() {
        let cache = CacheCoordinator::default();
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            let item = cache
                .item(ItemId::new(1), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(None)
                })
                .await
                .unwrap();
            assert!(item.is_none());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let cache = CacheCoordinator::default();
        let a = owner("alice");

        let failed = cache
            .cart_line(&a, ItemId::new(1), || async { Err::<Option<CartLine>, _>("down") })
            .await;
        assert!(failed.is_err());
        assert!(!cache.has_cart_line(&a, ItemId::new(1)).await);
    }

    #[tokio::test]
    async fn test_eviction_during_load_discards_result() {
        let cache = CacheCoordinator::default();
        let a = owner("alice");
        let stale = line(&a, 1, 1);

        let value = cache
            .cart_line(&a, ItemId::new(1), || {
                let cache = cache.clone();
                let a = a.clone();
                async move {
                    // A writer finishes while this read is in flight.
                    cache.evict_cart_line(&a, ItemId::new(1)).await;
                    Ok::<_, Infallible>(stale)
                }
            })
            .await
            .unwrap();

        assert_eq!(value.map(|l| l.quantity), Some(1));
        assert!(!cache.has_cart_line(&a, ItemId::new(1)).await);
    }
}
