//! Cart line records and the cart mutation actions.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{CartLineId, ItemId};
use super::owner::OwnerId;

/// One row of "item × quantity" in an owner's active cart.
///
/// At most one line exists per (owner, item). `quantity` is always at least 1;
/// a line that would drop to zero is deleted instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Storage ID of the line.
    pub id: CartLineId,
    /// Owner of the cart.
    pub owner: OwnerId,
    /// Item in the cart.
    pub item_id: ItemId,
    /// Units of the item (>= 1).
    pub quantity: u32,
}

/// Error returned when parsing an unknown cart action.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown cart action: {0:?}")]
pub struct CartActionError(pub String);

/// A cart mutation requested by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartAction {
    /// Add one unit (creates the line on first add).
    Plus,
    /// Remove one unit (deletes the line at zero).
    Minus,
    /// Delete the line regardless of quantity.
    Delete,
}

impl CartAction {
    /// Parse an action name as submitted by a form.
    ///
    /// Accepts `plus`/`increase`, `minus`/`decrease` and `delete`/`remove`
    /// (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`CartActionError`] for any other value.
    pub fn parse(s: &str) -> Result<Self, CartActionError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plus" | "increase" => Ok(Self::Plus),
            "minus" | "decrease" => Ok(Self::Minus),
            "delete" | "remove" => Ok(Self::Delete),
            _ => Err(CartActionError(s.to_string())),
        }
    }

    /// Canonical name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "plus",
            Self::Minus => "minus",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for CartAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CartAction {
    type Err = CartActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
