//! Extractors that turn malformed input into 422 validation errors.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request, rejection::JsonRejection, rejection::QueryRejection},
    http::request::Parts,
};
use serde::Deserialize;

use crate::error::AppError;

/// JSON body extractor with validation-style rejections.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string extractor with validation-style rejections.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// The `?id=` parameter of by-id routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    /// Parse the id into a typed id.
    ///
    /// # Errors
    ///
    /// Returns 400 "Invalid object id" if the id is missing, not an integer or
    /// not positive.
    pub fn parse<T: From<i32>>(&self) -> Result<T, AppError> {
        self.id
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .map(T::from)
            .ok_or_else(|| AppError::BadRequest("Invalid object id".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storehouse_core::ProductId;

    use super::*;

    fn query(id: Option<&str>) -> IdQuery {
        IdQuery {
            id: id.map(str::to_owned),
        }
    }

    #[test]
    fn test_parses_positive_integer() {
        let id: ProductId = query(Some("42")).parse().unwrap();
        assert_eq!(id, ProductId::new(42));
    }

    #[test]
    fn test_rejects_bad_ids() {
        for raw in [None, Some(""), Some("abc"), Some("0"), Some("-3"), Some("64b7f0c2")] {
            let err = query(raw).parse::<ProductId>().unwrap_err();
            assert_eq!(err.to_string(), "Invalid object id");
        }
    }
}
