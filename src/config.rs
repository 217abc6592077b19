/*
 * Responsibility
 * - 認証ミドルウェアの設定 (key material, lookup, hooks, claim checks)
 * - 設定値のバリデーション (不正なら build() が失敗する; リクエスト毎には失敗しない)
 * - 環境変数からの読み込み (JWT_*)
 */
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::request::Parts;
use jsonwebtoken::Algorithm;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{AuthError, HttpError};
use crate::extractors::claims::MapClaims;
use crate::middleware::auth::controller::JwtAuth;
use crate::services::auth::{JwtValidator, KeyResolver, KeyStrategy, SigningKey, TokenValidator};
use crate::services::extract::{
    DEFAULT_TOKEN_LOOKUP, ExtractError, ExtractorChain, LookupSource, parse_lookup,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("jwt middleware requires signing key")]
    MissingSigningKey,
    #[error("extractor source for lookup could not be split into needed parts: {0}")]
    LookupParts(String),
    #[error("unknown extractor source for lookup: {0}")]
    LookupSource(String),
    #[error("invalid header name in lookup: {0}")]
    LookupHeader(String),
    #[error("prefix is only supported for header lookups: {0}")]
    LookupPrefix(String),
    #[error("invalid signing key: {0}")]
    SigningKey(#[source] jsonwebtoken::errors::Error),
    #[error("signing method {algorithm:?} does not fit the signing key")]
    AlgorithmMismatch { algorithm: Algorithm },
    #[error("signing keys disagree on a signing method, set one explicitly")]
    AmbiguousAlgorithm,
    #[error("context key must not be empty")]
    EmptyContextKey,
}

/// Decides whether a request bypasses authentication entirely.
pub type Skipper = Arc<dyn Fn(&Parts) -> bool + Send + Sync>;
/// Runs once a credential has been located, before it is validated.
pub type BeforeHook = Arc<dyn Fn(&mut Parts) + Send + Sync>;
/// Runs after the claims have been published.
pub type SuccessHook = Arc<dyn Fn(&mut Parts) + Send + Sync>;
/// Translates a failure. `Ok(())` asks to continue (see `continue_on_ignored_error`).
pub type ErrorHandler =
    Arc<dyn Fn(&mut Parts, &AuthError) -> Result<(), HttpError> + Send + Sync>;

pub const DEFAULT_CONTEXT_KEY: &str = "user";
pub const DEFAULT_LEEWAY_SECONDS: u64 = 60;

/// Declarative middleware configuration, consumed by [`Config::build`].
///
/// Key selection precedence: `token_validator`, then `key_resolver`, then
/// `signing_keys`, then `signing_key`.
pub struct Config<C = MapClaims> {
    pub signing_key: Option<SigningKey>,
    /// `kid` to key. Takes precedence over `signing_key`.
    pub signing_keys: HashMap<String, SigningKey>,
    /// Expected `alg`. Defaults to the key family's usual algorithm.
    pub signing_method: Option<Algorithm>,
    pub token_lookup: String,
    /// Probed before the sources in `token_lookup`.
    pub token_lookup_fns: Vec<LookupSource>,
    pub skipper: Option<Skipper>,
    pub before: Option<BeforeHook>,
    pub on_success: Option<SuccessHook>,
    pub error_handler: Option<ErrorHandler>,
    pub continue_on_ignored_error: bool,
    pub key_resolver: Option<Arc<dyn KeyResolver>>,
    pub token_validator: Option<Arc<dyn TokenValidator<C>>>,
    /// Key under which the claims are stored in [`crate::extractors::claims::Locals`].
    pub context_key: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: u64,
}

impl<C> Default for Config<C> {
    fn default() -> Self {
        Self {
            signing_key: None,
            signing_keys: HashMap::new(),
            signing_method: None,
            token_lookup: DEFAULT_TOKEN_LOOKUP.to_string(),
            token_lookup_fns: Vec::new(),
            skipper: None,
            before: None,
            on_success: None,
            error_handler: None,
            continue_on_ignored_error: false,
            key_resolver: None,
            token_validator: None,
            context_key: DEFAULT_CONTEXT_KEY.to_string(),
            issuer: None,
            audience: None,
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
        }
    }
}

impl<C> fmt::Debug for Config<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<_> = self.signing_keys.keys().collect();
        kids.sort();

        f.debug_struct("Config")
            .field("signing_key", &self.signing_key)
            .field("signing_keys", &kids)
            .field("signing_method", &self.signing_method)
            .field("token_lookup", &self.token_lookup)
            .field("token_lookup_fns", &self.token_lookup_fns)
            .field("skipper", &self.skipper.is_some())
            .field("before", &self.before.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("continue_on_ignored_error", &self.continue_on_ignored_error)
            .field("key_resolver", &self.key_resolver.is_some())
            .field("token_validator", &self.token_validator.is_some())
            .field("context_key", &self.context_key)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl<C> Config<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// HMAC shortcut: `Config::with_secret("secret")` is a ready-to-build HS256 setup.
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self::default().with_signing_key(SigningKey::secret(secret))
    }

    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn with_signing_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = (K, SigningKey)>,
        K: Into<String>,
    {
        self.signing_keys
            .extend(keys.into_iter().map(|(kid, key)| (kid.into(), key)));
        self
    }

    pub fn with_signing_method(mut self, algorithm: Algorithm) -> Self {
        self.signing_method = Some(algorithm);
        self
    }

    pub fn with_token_lookup(mut self, lookup: impl Into<String>) -> Self {
        self.token_lookup = lookup.into();
        self
    }

    pub fn with_lookup_fn<F>(mut self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&Parts) -> Result<Vec<String>, ExtractError> + Send + Sync + 'static,
    {
        self.token_lookup_fns
            .push(LookupSource::custom(name, extractor));
        self
    }

    pub fn with_skipper<F>(mut self, skipper: F) -> Self
    where
        F: Fn(&Parts) -> bool + Send + Sync + 'static,
    {
        self.skipper = Some(Arc::new(skipper));
        self
    }

    pub fn with_before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Parts) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn with_on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Parts) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Parts, &AuthError) -> Result<(), HttpError> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_continue_on_ignored_error(mut self, enabled: bool) -> Self {
        self.continue_on_ignored_error = enabled;
        self
    }

    pub fn with_key_resolver(mut self, resolver: impl KeyResolver + 'static) -> Self {
        self.key_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_token_validator(mut self, validator: impl TokenValidator<C> + 'static) -> Self {
        self.token_validator = Some(Arc::new(validator));
        self
    }

    pub fn with_context_key(mut self, key: impl Into<String>) -> Self {
        self.context_key = key.into();
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_leeway_seconds(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `JWT_*` settings through `get`. Blank values count as unset.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(method) = var("JWT_SIGNING_METHOD") {
            let algorithm = Algorithm::from_str(method.trim())
                .map_err(|_| ConfigError::Invalid("JWT_SIGNING_METHOD"))?;
            config.signing_method = Some(algorithm);
        }

        if let Some(secret) = var("JWT_SIGNING_KEY") {
            config.signing_key = Some(SigningKey::secret(secret));
        }

        if let Some(pem) = var("JWT_PUBLIC_KEY_PEM") {
            if config.signing_key.is_some() {
                return Err(ConfigError::Invalid("JWT_PUBLIC_KEY_PEM"));
            }
            let pem = pem.replace("\\n", "\n").into_bytes();
            let algorithm = config.signing_method.unwrap_or(Algorithm::EdDSA);
            let key = [
                SigningKey::RsaPem(pem.clone()),
                SigningKey::EcPem(pem.clone()),
                SigningKey::EdPem(pem),
            ]
            .into_iter()
            .find(|key| key.supports(algorithm))
            .ok_or(ConfigError::Invalid("JWT_PUBLIC_KEY_PEM"))?;
            config.signing_key = Some(key);
        }

        if let Some(pairs) = var("JWT_SIGNING_KEYS") {
            for pair in pairs.split(',').filter(|pair| !pair.trim().is_empty()) {
                let (kid, secret) = pair
                    .split_once('=')
                    .map(|(kid, secret)| (kid.trim(), secret.trim()))
                    .filter(|(kid, secret)| !kid.is_empty() && !secret.is_empty())
                    .ok_or(ConfigError::Invalid("JWT_SIGNING_KEYS"))?;
                config
                    .signing_keys
                    .insert(kid.to_string(), SigningKey::secret(secret));
            }
        }

        if config.signing_key.is_none() && config.signing_keys.is_empty() {
            return Err(ConfigError::Missing("JWT_SIGNING_KEY"));
        }

        if let Some(lookup) = var("JWT_TOKEN_LOOKUP") {
            config.token_lookup = lookup;
        }
        if let Some(key) = var("JWT_CONTEXT_KEY") {
            config.context_key = key.trim().to_string();
        }
        if let Some(flag) = var("JWT_CONTINUE_ON_IGNORED_ERROR") {
            config.continue_on_ignored_error = parse_flag(&flag)
                .ok_or(ConfigError::Invalid("JWT_CONTINUE_ON_IGNORED_ERROR"))?;
        }
        config.issuer = var("JWT_ISSUER").map(|v| v.trim().to_string());
        config.audience = var("JWT_AUDIENCE").map(|v| v.trim().to_string());
        if let Some(leeway) = var("JWT_LEEWAY_SECONDS") {
            config.leeway_seconds = leeway
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("JWT_LEEWAY_SECONDS"))?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl<C> Config<C>
where
    C: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Validates the configuration and compiles it into the middleware.
    pub fn build(self) -> Result<JwtAuth<C>, ConfigError> {
        let validator: Arc<dyn TokenValidator<C>> = match self.token_validator {
            Some(validator) => validator,
            None => {
                let strategy = if let Some(resolver) = self.key_resolver {
                    KeyStrategy::Custom(resolver)
                } else if !self.signing_keys.is_empty() {
                    KeyStrategy::from_signing_keys(&self.signing_keys, self.signing_method)?
                } else if let Some(key) = &self.signing_key {
                    KeyStrategy::from_signing_key(key, self.signing_method)?
                } else {
                    return Err(ConfigError::MissingSigningKey);
                };
                tracing::debug!(strategy = ?strategy, "jwt key strategy selected");

                let validation = JwtValidator::validation(
                    self.issuer.as_deref(),
                    self.audience.as_deref(),
                    self.leeway_seconds,
                );
                Arc::new(JwtValidator::new(Arc::new(strategy), validation))
            }
        };

        let mut sources = self.token_lookup_fns;
        sources.extend(parse_lookup(&self.token_lookup)?);

        if self.context_key.trim().is_empty() {
            return Err(ConfigError::EmptyContextKey);
        }

        Ok(JwtAuth {
            chain: ExtractorChain::new(sources),
            validator,
            skipper: self.skipper,
            before: self.before,
            on_success: self.on_success,
            error_handler: self.error_handler,
            continue_on_ignored_error: self.continue_on_ignored_error,
            context_key: self.context_key,
        })
    }
}
