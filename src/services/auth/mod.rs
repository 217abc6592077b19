/*
 * Responsibility
 * - Key resolution (static key / kid-keyed map / caller-supplied resolver)
 * - Token verification and claims decoding (jsonwebtoken)
 */
pub mod keys;
pub mod validator;

pub use keys::{FnKeyResolver, KeyResolver, KeyStrategy, SigningKey};
pub use validator::{FnValidator, JwtValidator, TokenValidator, ValidationError};
