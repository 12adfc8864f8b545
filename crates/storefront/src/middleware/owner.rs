//! Owner identity extractors.
//!
//! Authentication happens upstream; the authenticated login name arrives in
//! the `X-User` header. A missing header means an anonymous visitor.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::Span;

use intershop_core::OwnerId;

use crate::error::{AppError, set_sentry_user};

/// The HTTP header carrying the authenticated owner.
pub const OWNER_HEADER: &str = "x-user";

/// Read and validate the owner header, if present.
fn owner_from_parts(parts: &Parts) -> Result<Option<OwnerId>, AppError> {
    let Some(value) = parts.headers.get(OWNER_HEADER) else {
        return Ok(None);
    };

    let raw = value
        .to_str()
        .map_err(|_| AppError::BadRequest("X-User header is not valid text".to_string()))?;
    let owner = OwnerId::parse(raw)
        .map_err(|e| AppError::BadRequest(format!("invalid X-User header: {e}")))?;

    Span::current().record("owner", owner.as_str());
    set_sentry_user(&owner);
    Ok(Some(owner))
}

/// Extractor that requires an owner.
///
/// # Example
///
/// ```rust,ignore
/// async fn cart(RequireOwner(owner): RequireOwner) -> impl IntoResponse {
///     format!("Cart of {owner}")
/// }
/// ```
pub struct RequireOwner(pub OwnerId);

impl<S> FromRequestParts<S> for RequireOwner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        owner_from_parts(parts)?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("X-User header required".to_string()))
    }
}

/// Extractor that optionally gets the owner.
///
/// Unlike `RequireOwner`, this does not reject anonymous requests. A present
/// but malformed header is still rejected.
pub struct OptionalOwner(pub Option<OwnerId>);

impl<S> FromRequestParts<S> for OptionalOwner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        owner_from_parts(parts).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/cart");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_require_owner() {
        let RequireOwner(owner) = RequireOwner::from_request_parts(&mut parts(Some("user1")), &())
            .await
            .unwrap();
        assert_eq!(owner.as_str(), "user1");
    }

    #[tokio::test]
    async fn test_require_owner_missing_is_unauthorized() {
        let Err(rejection) = RequireOwner::from_request_parts(&mut parts(None), &()).await else {
            panic!("anonymous request accepted");
        };
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_optional_owner() {
        let OptionalOwner(owner) = OptionalOwner::from_request_parts(&mut parts(None), &())
            .await
            .unwrap();
        assert!(owner.is_none());

        let Err(rejection) = OptionalOwner::from_request_parts(&mut parts(Some("two words")), &()).await
        else {
            panic!("malformed owner accepted");
        };
        assert_eq!(rejection.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
