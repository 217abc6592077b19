/*
 * Responsibility
 * - Classified authentication failures (credential missing vs credential invalid)
 * - HttpError: what the client gets back (status + message, internal cause kept aside)
 * - IntoResponse 実装 (HTTP status / JSON error body / WWW-Authenticate)
 */
use std::fmt;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::validator::ValidationError;
use crate::services::extract::core::ExtractError;

/// Client-facing message when no usable credential was found.
pub const MSG_MISSING: &str = "missing or malformed credential";
/// Client-facing message when a credential was found but rejected.
pub const MSG_INVALID: &str = "invalid or expired credential";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// No credential could be located in the request.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TokenExtractionError(#[source] ExtractError);

impl TokenExtractionError {
    pub fn new(cause: ExtractError) -> Self {
        Self(cause)
    }

    pub fn cause(&self) -> &ExtractError {
        &self.0
    }
}

/// A credential was located but did not verify.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TokenParsingError(#[source] ValidationError);

impl TokenParsingError {
    pub fn new(cause: ValidationError) -> Self {
        Self(cause)
    }

    pub fn cause(&self) -> &ValidationError {
        &self.0
    }
}

/// What the error handler sees. The variant is the contract, the message is the cause's.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Extraction(#[from] TokenExtractionError),
    #[error(transparent)]
    Parsing(#[from] TokenParsingError),
}

impl From<ExtractError> for AuthError {
    fn from(e: ExtractError) -> Self {
        Self::Extraction(TokenExtractionError::new(e))
    }
}

impl From<ValidationError> for AuthError {
    fn from(e: ValidationError) -> Self {
        Self::Parsing(TokenParsingError::new(e))
    }
}

impl AuthError {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Extraction(_))
    }

    /// Message of the default translation.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Extraction(_) => MSG_MISSING,
            Self::Parsing(_) => MSG_INVALID,
        }
    }
}

/// Error returned by the per-request entry point and rendered as the response.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    internal: Option<AuthError>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            internal: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn with_internal(mut self, internal: AuthError) -> Self {
        self.internal = Some(internal);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn internal(&self) -> Option<&AuthError> {
        self.internal.as_ref()
    }

    fn code(&self) -> String {
        self.status
            .canonical_reason()
            .unwrap_or("ERROR")
            .to_ascii_uppercase()
            .replace(' ', "_")
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}, message={}", self.status.as_u16(), self.message)?;
        if let Some(internal) = &self.internal {
            write!(f, ", internal={internal}")?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.internal
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<AuthError> for HttpError {
    fn from(e: AuthError) -> Self {
        Self::unauthorized(e.public_message()).with_internal(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let challenge = match &self.internal {
            _ if self.status != StatusCode::UNAUTHORIZED => None,
            Some(AuthError::Parsing(_)) => Some(r#"Bearer error="invalid_token""#),
            _ => Some("Bearer"),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.message,
            },
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(challenge) = challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(challenge),
            );
        }
        response
    }
}
