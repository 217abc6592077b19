//! Bearer JWT authentication middleware for axum.
//!
//! A credential is looked up in the request (header, query string, path parameter,
//! cookie, form field or a custom source), verified with `jsonwebtoken`, and the
//! decoded claims are handed to downstream handlers through request extensions.
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use bearer_jwt::{Claims, Config, MapClaims, middleware::auth};
//!
//! let jwt = Config::<MapClaims>::with_secret("secret").build()?;
//! let app = auth::apply(
//!     Router::new().route("/me", get(|Claims(claims): Claims| async move {
//!         axum::Json(claims)
//!     })),
//!     jwt,
//! );
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod services;

pub use config::{Config, ConfigError};
pub use error::{AuthError, HttpError, TokenExtractionError, TokenParsingError};
pub use extractors::claims::{Claims, Locals, MapClaims};
pub use middleware::auth::{JwtAuth, Outcome};
pub use services::auth::{
    FnKeyResolver, FnValidator, KeyResolver, SigningKey, TokenValidator, ValidationError,
};
pub use services::extract::{ExtractError, LookupSource};

/// Re-exported so callers can name algorithms and keys without a direct dependency.
pub use jsonwebtoken;
