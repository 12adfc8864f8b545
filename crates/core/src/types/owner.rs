//! Owner identity type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OwnerId`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum OwnerIdError {
    /// The input string is empty or only whitespace.
    #[error("owner id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("owner id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace or control characters.
    #[error("owner id must not contain whitespace or control characters")]
    InvalidCharacter,
}

/// The identity a cart or order belongs to.
///
/// Owners are identified by the login name of the authenticated user; the
/// same string is used as the account key at the payment service.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - No whitespace or control characters
///
/// ## Examples
///
/// ```
/// use intershop_core::OwnerId;
///
/// assert!(OwnerId::parse("user1").is_ok());
/// assert!(OwnerId::parse("").is_err());
/// assert!(OwnerId::parse("two words").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Maximum length of an owner id.
    pub const MAX_LENGTH: usize = 64;

    /// Parse an `OwnerId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 64 characters, or
    /// contains whitespace/control characters.
    pub fn parse(s: &str) -> Result<Self, OwnerIdError> {
        if s.trim().is_empty() {
            return Err(OwnerIdError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(OwnerIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(OwnerIdError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the owner id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `OwnerId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OwnerId {
    type Err = OwnerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OwnerId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OwnerId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OwnerId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_owner_ids() {
        assert!(OwnerId::parse("user1").is_ok());
        assert!(OwnerId::parse("alice@example.com").is_ok());
        assert!(OwnerId::parse("u").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(OwnerId::parse(""), Err(OwnerIdError::Empty)));
        assert!(matches!(OwnerId::parse("   "), Err(OwnerIdError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(65);
        assert!(matches!(
            OwnerId::parse(&long),
            Err(OwnerIdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_whitespace() {
        assert!(matches!(
            OwnerId::parse("user 1"),
            Err(OwnerIdError::InvalidCharacter)
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let owner = OwnerId::parse("user1").unwrap();
        let json = serde_json::to_string(&owner).unwrap();
        assert_eq!(json, "\"user1\"");

        let parsed: OwnerId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, owner);
    }
}
