//! Catalog types: items, sort modes, paging and tile layout.

use serde::{Deserialize, Serialize};

use super::id::ItemId;
use super::price::Price;

/// Number of items per row in tile presentation.
pub const TILE_WIDTH: usize = 3;

/// A catalog item.
///
/// Items are immutable catalog facts. The `count` field is request-scoped: it
/// carries the viewer's current cart quantity and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Catalog ID.
    pub id: ItemId,
    /// Display title.
    pub title: String,
    /// Long description.
    pub description: String,
    /// Relative path to the item image.
    pub img_path: String,
    /// Unit price.
    pub price: Price,
    /// Units in stock.
    pub stock_count: i32,
    /// Viewer's cart quantity (0 for anonymous viewers or items not in the cart).
    #[serde(default)]
    pub count: u32,
}

impl Item {
    /// Return a copy of this item decorated with a viewer's cart quantity.
    #[must_use]
    pub fn with_count(&self, count: u32) -> Self {
        Self {
            count,
            ..self.clone()
        }
    }

    /// Whether `query` matches this item (case-insensitive substring of title or description).
    ///
    /// A blank query matches everything.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        needle.is_empty()
            || self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

/// Search result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortMode {
    /// Insertion (catalog id) order.
    #[default]
    No,
    /// Title ascending.
    Alpha,
    /// Price ascending.
    Price,
}

impl SortMode {
    /// Parse from a URL parameter value. Unknown values fall back to insertion order.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALPHA" | "TITLE" => Self::Alpha,
            "PRICE" => Self::Price,
            _ => Self::No,
        }
    }

    /// Convert to URL parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::No => "NO",
            Self::Alpha => "ALPHA",
            Self::Price => "PRICE",
        }
    }

    /// Sort a slice of items in place according to this mode.
    ///
    /// Ties are broken by item id so the order is total and stable across calls.
    pub fn sort(self, items: &mut [Item]) {
        match self {
            Self::No => items.sort_by_key(|item| item.id),
            Self::Alpha => items.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id))),
            Self::Price => items.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id))),
        }
    }
}

/// Paging information for a search page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// 1-based page number.
    pub page_number: u32,
    /// Items per page.
    pub page_size: u32,
    /// Whether a following page exists.
    pub has_next: bool,
    /// Whether a preceding page exists.
    pub has_previous: bool,
}

impl Paging {
    /// Compute paging flags for a page of a result set with `total` matches.
    #[must_use]
    pub fn new(page_number: u32, page_size: u32, total: u64) -> Self {
        Self {
            page_number,
            page_size,
            has_next: u64::from(page_number) * u64::from(page_size) < total,
            has_previous: page_number > 1,
        }
    }

    /// Zero-based row offset of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page_number.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Group items into rows of [`TILE_WIDTH`] for grid presentation.
///
/// Row `k` holds items `[3k, 3k + 3)`; the last row may be shorter. Order and
/// counts are preserved.
#[must_use]
pub fn tile<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    items.chunks(TILE_WIDTH).map(<[T]>::to_vec).collect()
}
