//! In-memory implementation of all repositories.
//!
//! Used when no database is configured and by the test suites. All state sits
//! behind one lock, so every trait method is atomic with respect to every
//! other, which gives the same guarantees as the single-statement SQL
//! implementations.
//!
//! The store also supports fault injection and counts reads, so tests can
//! observe whether a code path reached the store or was served from cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use intershop_core::{
    CartLine, CartLineId, Item, ItemId, NewOrder, NewOrderLine, Order, OrderId, OrderLine,
    OrderLineId, OrderedItem, OwnerId, Price,
};

use super::{
    CartRepository, CatalogPage, ItemRepository, OrderRepository, RepositoryError,
};

#[derive(Default)]
struct MemoryState {
    items: BTreeMap<ItemId, Item>,
    cart_lines: HashMap<(OwnerId, ItemId), CartLine>,
    orders: BTreeMap<OrderId, Order>,
    order_lines: BTreeMap<OrderLineId, OrderLine>,
    next_item_id: i64,
    next_cart_line_id: i64,
    next_order_id: i64,
    next_order_line_id: i64,
}

impl MemoryState {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

/// Store operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every operation fails as if the backend were unreachable.
    Unavailable,
    /// `OrderRepository::save` fails.
    SaveOrder,
    /// `OrderRepository::save_lines` fails.
    SaveOrderLines,
    /// `CartRepository::delete_all_lines` and `remove_quantities` fail.
    ClearCart,
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    save_order: AtomicBool,
    save_order_lines: AtomicBool,
    clear_cart: AtomicBool,
}

impl Faults {
    const fn flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::Unavailable => &self.unavailable,
            Fault::SaveOrder => &self.save_order,
            Fault::SaveOrderLines => &self.save_order_lines,
            Fault::ClearCart => &self.clear_cart,
        }
    }

    fn check(&self, fault: Fault) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) || self.flag(fault).load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(format!(
                "injected fault: {fault:?}"
            )));
        }
        Ok(())
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        self.check(Fault::Unavailable)
    }
}

/// Number of store reads per kind, for cache tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounts {
    /// `ItemRepository::find_by_id` calls.
    pub item_lookups: usize,
    /// `ItemRepository::search` calls.
    pub searches: usize,
    /// `CartRepository::find_line` calls.
    pub line_lookups: usize,
    /// `CartRepository::list_lines` calls.
    pub line_listings: usize,
}

#[derive(Default)]
struct ReadCounters {
    item_lookups: AtomicUsize,
    searches: AtomicUsize,
    line_lookups: AtomicUsize,
    line_listings: AtomicUsize,
}

/// In-memory catalog, cart and order store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    faults: Faults,
    reads: ReadCounters,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a catalog item and return it with its assigned ID.
    pub async fn insert_item(
        &self,
        title: &str,
        description: &str,
        img_path: &str,
        price: Price,
        stock_count: i32,
    ) -> Item {
        let mut state = self.state.write().await;
        let id = ItemId::new(MemoryState::next_id(&mut state.next_item_id));
        let item = Item {
            id,
            title: title.to_owned(),
            description: description.to_owned(),
            img_path: img_path.to_owned(),
            price,
            stock_count,
            count: 0,
        };
        state.items.insert(id, item.clone());
        item
    }

    /// Change an item's catalog price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn set_item_price(&self, id: ItemId, price: Price) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let item = state.items.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        item.price = price;
        Ok(())
    }

    /// Turn an injected fault on or off.
    pub fn set_fault(&self, fault: Fault, enabled: bool) {
        self.faults.flag(fault).store(enabled, Ordering::SeqCst);
    }

    /// Snapshot of the read counters.
    #[must_use]
    pub fn read_counts(&self) -> ReadCounts {
        ReadCounts {
            item_lookups: self.reads.item_lookups.load(Ordering::SeqCst),
            searches: self.reads.searches.load(Ordering::SeqCst),
            line_lookups: self.reads.line_lookups.load(Ordering::SeqCst),
            line_listings: self.reads.line_listings.load(Ordering::SeqCst),
        }
    }

    /// Total number of stored orders across all owners.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn find_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        self.reads.item_lookups.fetch_add(1, Ordering::SeqCst);
        self.faults.check_available()?;
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn search(
        &self,
        query: &str,
        sort: intershop_core::SortMode,
        offset: u64,
        limit: u32,
    ) -> Result<CatalogPage, RepositoryError> {
        self.reads.searches.fetch_add(1, Ordering::SeqCst);
        self.faults.check_available()?;

        let state = self.state.read().await;
        let mut matching: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.matches(query))
            .cloned()
            .collect();
        sort.sort(&mut matching);

        let total_count = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect();

        Ok(CatalogPage { items, total_count })
    }

    async fn find_by_order_id(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderedItem>, RepositoryError> {
        self.faults.check_available()?;

        let state = self.state.read().await;
        state
            .order_lines
            .values()
            .filter(|line| line.order_id == order_id)
            .map(|line| {
                let item = state.items.get(&line.item_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "order line references missing item {}",
                        line.item_id
                    ))
                })?;
                Ok(OrderedItem {
                    item_id: line.item_id,
                    title: item.title.clone(),
                    img_path: item.img_path.clone(),
                    quantity: line.quantity,
                    price_per_item: line.price_per_item,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.faults.check_available()
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        self.reads.line_lookups.fetch_add(1, Ordering::SeqCst);
        self.faults.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .cart_lines
            .get(&(owner.clone(), item_id))
            .cloned())
    }

    async fn list_lines(&self, owner: &OwnerId) -> Result<Vec<CartLine>, RepositoryError> {
        self.reads.line_listings.fetch_add(1, Ordering::SeqCst);
        self.faults.check_available()?;

        let state = self.state.read().await;
        let mut lines: Vec<CartLine> = state
            .cart_lines
            .values()
            .filter(|line| &line.owner == owner)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.item_id);
        Ok(lines)
    }

    async fn upsert_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<CartLine, RepositoryError> {
        self.faults.check_available()?;
        if quantity == 0 {
            return Err(RepositoryError::Conflict(
                "cart line quantity must be positive".to_owned(),
            ));
        }

        let mut state = self.state.write().await;
        if !state.items.contains_key(&item_id) {
            return Err(RepositoryError::NotFound);
        }

        let key = (owner.clone(), item_id);
        if let Some(line) = state.cart_lines.get_mut(&key) {
            line.quantity = quantity;
            return Ok(line.clone());
        }

        let id = CartLineId::new(MemoryState::next_id(&mut state.next_cart_line_id));
        let line = CartLine {
            id,
            owner: owner.clone(),
            item_id,
            quantity,
        };
        state.cart_lines.insert(key, line.clone());
        Ok(line)
    }

    async fn increment_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<CartLine, RepositoryError> {
        self.faults.check_available()?;

        let mut state = self.state.write().await;
        if !state.items.contains_key(&item_id) {
            return Err(RepositoryError::NotFound);
        }

        let key = (owner.clone(), item_id);
        if let Some(line) = state.cart_lines.get_mut(&key) {
            line.quantity = line.quantity.checked_add(1).ok_or_else(|| {
                RepositoryError::Conflict("cart line quantity overflow".to_owned())
            })?;
            return Ok(line.clone());
        }

        let id = CartLineId::new(MemoryState::next_id(&mut state.next_cart_line_id));
        let line = CartLine {
            id,
            owner: owner.clone(),
            item_id,
            quantity: 1,
        };
        state.cart_lines.insert(key, line.clone());
        Ok(line)
    }

    async fn decrement_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        self.faults.check_available()?;

        let mut state = self.state.write().await;
        let key = (owner.clone(), item_id);
        match state.cart_lines.get_mut(&key) {
            Some(line) if line.quantity > 1 => {
                line.quantity -= 1;
                Ok(Some(line.clone()))
            }
            Some(_) => {
                state.cart_lines.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<bool, RepositoryError> {
        self.faults.check_available()?;
        Ok(self
            .state
            .write()
            .await
            .cart_lines
            .remove(&(owner.clone(), item_id))
            .is_some())
    }

    async fn delete_all_lines(&self, owner: &OwnerId) -> Result<u64, RepositoryError> {
        self.faults.check(Fault::ClearCart)?;

        let mut state = self.state.write().await;
        let before = state.cart_lines.len();
        state.cart_lines.retain(|(line_owner, _), _| line_owner != owner);
        Ok((before - state.cart_lines.len()) as u64)
    }

    async fn remove_quantities(
        &self,
        owner: &OwnerId,
        lines: &[(ItemId, u32)],
    ) -> Result<u64, RepositoryError> {
        self.faults.check(Fault::ClearCart)?;

        let mut state = self.state.write().await;
        let mut removed = 0;
        for &(item_id, quantity) in lines {
            let key = (owner.clone(), item_id);
            match state.cart_lines.get_mut(&key) {
                Some(line) if line.quantity > quantity => line.quantity -= quantity,
                Some(_) => {
                    state.cart_lines.remove(&key);
                    removed += 1;
                }
                None => {}
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn save(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.faults.check(Fault::SaveOrder)?;

        let mut state = self.state.write().await;
        let id = OrderId::new(MemoryState::next_id(&mut state.next_order_id));
        let saved = Order {
            id,
            owner: order.owner.clone(),
            created_at: order.created_at,
            total_price: order.total_price,
        };
        state.orders.insert(id, saved.clone());
        Ok(saved)
    }

    async fn save_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        self.faults.check(Fault::SaveOrderLines)?;

        let mut state = self.state.write().await;
        if !state.orders.contains_key(&order_id) {
            return Err(RepositoryError::NotFound);
        }

        let mut saved = Vec::with_capacity(lines.len());
        for line in lines {
            let id = OrderLineId::new(MemoryState::next_id(&mut state.next_order_line_id));
            let order_line = OrderLine {
                id,
                order_id,
                item_id: line.item_id,
                quantity: line.quantity,
                price_per_item: line.price_per_item,
            };
            saved.push(order_line);
        }
        for line in &saved {
            state.order_lines.insert(line.id, line.clone());
        }
        Ok(saved)
    }

    async fn delete(&self, order_id: OrderId) -> Result<bool, RepositoryError> {
        self.faults.check_available()?;

        let mut state = self.state.write().await;
        state.order_lines.retain(|_, line| line.order_id != order_id);
        Ok(state.orders.remove(&order_id).is_some())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.faults.check_available()?;
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Order>, RepositoryError> {
        self.faults.check_available()?;

        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| &order.owner == owner)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn find_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        self.faults.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .order_lines
            .values()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn owner(name: &str) -> OwnerId {
        OwnerId::parse(name).unwrap()
    }

    async fn store_with_item() -> (InMemoryStore, ItemId) {
        let store = InMemoryStore::new();
        let item = store
            .insert_item("Ball", "Red ball", "ball.jpg", Price::from_cents(1000), 5)
            .await;
        (store, item.id)
    }

    #[tokio::test]
    async fn test_increment_creates_then_adds() {
        let (store, item) = store_with_item().await;
        let alice = owner("alice");

        assert_eq!(store.increment_line(&alice, item).await.unwrap().quantity, 1);
        assert_eq!(store.increment_line(&alice, item).await.unwrap().quantity, 2);
        assert_eq!(store.list_lines(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_increment_unknown_item() {
        let store = InMemoryStore::new();
        let result = store.increment_line(&owner("alice"), ItemId::new(99)).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_decrement_deletes_at_one() {
        let (store, item) = store_with_item().await;
        let alice = owner("alice");
        store.upsert_line(&alice, item, 2).await.unwrap();

        let line = store.decrement_line(&alice, item).await.unwrap();
        assert_eq!(line.map(|l| l.quantity), Some(1));

        assert!(store.decrement_line(&alice, item).await.unwrap().is_none());
        assert!(store.find_line(&alice, item).await.unwrap().is_none());

        // Absent line is a no-op
        assert!(store.decrement_line(&alice, item).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_rejects_zero() {
        let (store, item) = store_with_item().await;
        let result = store.upsert_line(&owner("alice"), item, 0).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_all_lines_is_owner_scoped() {
        let (store, item) = store_with_item().await;
        let alice = owner("alice");
        let bob = owner("bob");
        store.increment_line(&alice, item).await.unwrap();
        store.increment_line(&bob, item).await.unwrap();

        assert_eq!(store.delete_all_lines(&alice).await.unwrap(), 1);
        assert!(store.list_lines(&alice).await.unwrap().is_empty());
        assert_eq!(store.list_lines(&bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_quantities_keeps_later_additions() {
        let store = InMemoryStore::new();
        let ball = store
            .insert_item("Ball", "Red ball", "ball.jpg", Price::from_cents(1000), 5)
            .await
            .id;
        let lamp = store
            .insert_item("Lamp", "Desk lamp", "lamp.jpg", Price::from_cents(2550), 5)
            .await
            .id;
        let alice = owner("alice");
        store.upsert_line(&alice, ball, 3).await.unwrap();
        store.upsert_line(&alice, lamp, 1).await.unwrap();

        // Snapshot had 2 balls; a third was added afterwards
        let removed = store
            .remove_quantities(&alice, &[(ball, 2), (lamp, 1)])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let lines = store.list_lines(&alice).await.unwrap();
        assert_eq!(lines.len(), 1);
        let line = lines.first().unwrap();
        assert_eq!(line.item_id, ball);
        assert_eq!(line.quantity, 1);
    }

    #[tokio::test]
    async fn test_remove_quantities_honors_clear_cart_fault() {
        let (store, item) = store_with_item().await;
        let alice = owner("alice");
        store.increment_line(&alice, item).await.unwrap();
        store.set_fault(Fault::ClearCart, true);

        let result = store.remove_quantities(&alice, &[(item, 1)]).await;

        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
        assert_eq!(store.list_lines(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_decrements_remove_line() {
        let (store, item) = store_with_item().await;
        let store = std::sync::Arc::new(store);
        let alice = owner("alice");
        store.upsert_line(&alice, item, 2).await.unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let alice = alice.clone();
                tokio::spawn(async move { store.decrement_line(&alice, item).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(store.find_line(&alice, item).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_fault() {
        let (store, item) = store_with_item().await;
        store.set_fault(Fault::Unavailable, true);
        assert!(matches!(
            ItemRepository::find_by_id(&store, item).await,
            Err(RepositoryError::Unavailable(_))
        ));
        store.set_fault(Fault::Unavailable, false);
        assert!(
            ItemRepository::find_by_id(&store, item)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let (store, item) = store_with_item().await;
        let store = std::sync::Arc::new(store);
        let alice = owner("alice");

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                let alice = alice.clone();
                tokio::spawn(async move { store.increment_line(&alice, item).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let line = store.find_line(&alice, item).await.unwrap().unwrap();
        assert_eq!(line.quantity, 50);
    }
}
