//! Per-request authentication: skip check, extraction, validation, hooks and the
//! continue / abort decision.
//!
//! Independent of the axum middleware plumbing so it can be driven with bare `Parts`
//! and a body.

use std::{fmt, sync::Arc};

use axum::body::Body;
use axum::http::request::Parts;

use crate::config::{BeforeHook, ErrorHandler, Skipper, SuccessHook};
use crate::error::{AuthError, HttpError};
use crate::extractors::claims::{Claims, MapClaims, store};
use crate::services::auth::TokenValidator;
use crate::services::extract::{ExtractError, ExtractorChain};

/// How a request left the controller when it was allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Claims were validated and published.
    Authenticated,
    /// The skipper bypassed authentication.
    Skipped,
    /// Authentication failed, but the error handler let the request through.
    Ignored,
}

/// Compiled middleware, produced by [`crate::config::Config::build`]. Immutable and
/// shared across requests.
pub struct JwtAuth<C = MapClaims> {
    pub(crate) chain: ExtractorChain,
    pub(crate) validator: Arc<dyn TokenValidator<C>>,
    pub(crate) skipper: Option<Skipper>,
    pub(crate) before: Option<BeforeHook>,
    pub(crate) on_success: Option<SuccessHook>,
    pub(crate) error_handler: Option<ErrorHandler>,
    pub(crate) continue_on_ignored_error: bool,
    pub(crate) context_key: String,
}

impl<C> fmt::Debug for JwtAuth<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuth")
            .field("chain", &self.chain)
            .field("skipper", &self.skipper.is_some())
            .field("before", &self.before.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("continue_on_ignored_error", &self.continue_on_ignored_error)
            .field("context_key", &self.context_key)
            .finish_non_exhaustive()
    }
}

impl<C> JwtAuth<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Authenticates one request.
    ///
    /// On success the claims are available as [`Claims<C>`] in the extensions and under
    /// `context_key` in [`crate::extractors::claims::Locals`]. `body` is only read when
    /// a `form` source is reached, and is handed back with the same bytes.
    pub async fn authenticate(
        &self,
        parts: &mut Parts,
        body: &mut Body,
    ) -> Result<Outcome, HttpError> {
        if self.skipper.as_ref().is_some_and(|skip| skip(&*parts)) {
            tracing::debug!(path = %parts.uri.path(), "authentication skipped");
            return Ok(Outcome::Skipped);
        }

        match self.verify(parts, body).await {
            Ok(claims) => {
                parts.extensions.insert(Claims(claims.clone()));
                store(&mut parts.extensions, self.context_key.clone(), claims);

                if let Some(on_success) = &self.on_success {
                    on_success(parts);
                }
                Ok(Outcome::Authenticated)
            }
            Err(err) => self.fail(parts, err),
        }
    }

    async fn verify(&self, parts: &mut Parts, body: &mut Body) -> Result<C, AuthError> {
        let candidates = self.chain.extract(parts, body).await?;

        if let Some(before) = &self.before {
            before(parts);
        }

        // Candidates all come from one source; a rejection there is final.
        let mut last_err = None;
        for candidate in candidates {
            match self.validator.validate(parts, &candidate.value).await {
                Ok(claims) => {
                    tracing::debug!(source = %candidate.source, "credential accepted");
                    return Ok(claims);
                }
                Err(err) => {
                    tracing::debug!(
                        source = %candidate.source,
                        error = %err,
                        "credential rejected"
                    );
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AuthError::from(ExtractError::NoSources)))
    }

    fn fail(&self, parts: &mut Parts, err: AuthError) -> Result<Outcome, HttpError> {
        if err.is_missing() {
            tracing::debug!(error = %err, "no credential in request");
        } else {
            tracing::warn!(error = %err, "credential verification failed");
        }

        let Some(handler) = &self.error_handler else {
            return Err(HttpError::from(err));
        };

        match handler(parts, &err) {
            Ok(()) if self.continue_on_ignored_error => {
                tracing::debug!(error = %err, "continuing with ignored authentication error");
                Ok(Outcome::Ignored)
            }
            Ok(()) => {
                tracing::warn!(
                    error = %err,
                    "error handler returned no error but continue_on_ignored_error is disabled"
                );
                Err(HttpError::from(err))
            }
            Err(replacement) => Err(replacement),
        }
    }
}
