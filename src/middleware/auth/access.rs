//! bearer JWT 検証 → Claims を extensions に入れる
//!
//! Captures the matched path params the extractor chain cannot read from bare `Parts`,
//! then hands the request over to [`JwtAuth::authenticate`]. The body is passed along
//! so a `form` source can read it on demand.

use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRequestParts, RawPathParams, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use super::controller::JwtAuth;
use crate::services::extract::PathParams;

/// Protects every route registered on `router` so far.
///
/// 例：
/// ```ignore
/// let auth = Config::<MapClaims>::from_env()?.build()?;
/// let api = middleware::auth::access::apply(api::routes(), auth);
/// app = app.nest("/api/v1", api);
/// ```
pub fn apply<S, C>(router: Router<S>, auth: JwtAuth<C>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    // route_layer: unmatched paths keep answering 404 instead of 401
    router.route_layer(middleware::from_fn_with_state(
        Arc::new(auth),
        jwt_middleware::<C>,
    ))
}

async fn jwt_middleware<C>(
    State(auth): State<Arc<JwtAuth<C>>>,
    req: Request,
    next: Next,
) -> Response
where
    C: Clone + Send + Sync + 'static,
{
    let (mut parts, mut body) = req.into_parts();

    if let Ok(params) =
        <RawPathParams as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await
    {
        let params = params
            .iter()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect();
        parts.extensions.insert(PathParams(params));
    }

    match auth.authenticate(&mut parts, &mut body).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "request passed authentication");
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => err.into_response(),
    }
}
