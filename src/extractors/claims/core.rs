use std::{any::Any, convert::Infallible};

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{Extensions, request::Parts};

use super::{Claims, Locals};
use crate::error::{HttpError, MSG_MISSING};

/// Stores `value` under `key` in the request's [`Locals`], creating them on first use.
pub fn store<T>(extensions: &mut Extensions, key: impl Into<String>, value: T)
where
    T: Any + Send + Sync,
{
    match extensions.get_mut::<Locals>() {
        Some(locals) => locals.insert(key, value),
        None => {
            let mut locals = Locals::default();
            locals.insert(key, value);
            extensions.insert(locals);
        }
    }
}

pub fn retrieve<'a, T>(extensions: &'a Extensions, key: &str) -> Option<&'a T>
where
    T: Any + Send + Sync,
{
    extensions.get::<Locals>()?.get(key)
}

/// Handler で、検証済み claims を受け取るための extractor
/// middleware が Claims を request.extensions() に insert 済みである前提
/// 見つからない場合は 401 を返す（ミドルウェア未設定、または ignored error で続行した）
impl<S, C> FromRequestParts<S> for Claims<C>
where
    S: Send + Sync,
    C: Clone + Send + Sync + 'static,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims<C>>()
            .cloned()
            .ok_or_else(|| HttpError::unauthorized(MSG_MISSING))
    }
}

/// `Option<Claims<C>>` for routes that also serve anonymous callers.
impl<S, C> OptionalFromRequestParts<S> for Claims<C>
where
    S: Send + Sync,
    C: Clone + Send + Sync + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Claims<C>>().cloned())
    }
}
