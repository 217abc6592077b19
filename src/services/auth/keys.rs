//! Key resolution: picks the verification key for a token whose header has been decoded
//! but whose signature has not been checked yet.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Header};

use super::validator::ValidationError;
use crate::config::ConfigError;

/// Key material as supplied by configuration.
///
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub enum SigningKey {
    /// Shared HMAC secret.
    Secret(Vec<u8>),
    /// RSA public key, PEM encoded.
    RsaPem(Vec<u8>),
    /// EC public key, PEM encoded.
    EcPem(Vec<u8>),
    /// Ed25519 public key, PEM encoded.
    EdPem(Vec<u8>),
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Secret(_) => "Secret",
            Self::RsaPem(_) => "RsaPem",
            Self::EcPem(_) => "EcPem",
            Self::EdPem(_) => "EdPem",
        };
        f.debug_tuple(kind).field(&"..").finish()
    }
}

impl SigningKey {
    pub fn secret(secret: impl Into<Vec<u8>>) -> Self {
        Self::Secret(secret.into())
    }

    /// Algorithm expected when the configuration names none.
    pub fn default_algorithm(&self) -> Algorithm {
        match self {
            Self::Secret(_) => Algorithm::HS256,
            Self::RsaPem(_) => Algorithm::RS256,
            Self::EcPem(_) => Algorithm::ES256,
            Self::EdPem(_) => Algorithm::EdDSA,
        }
    }

    pub fn supports(&self, algorithm: Algorithm) -> bool {
        use Algorithm::*;

        match self {
            Self::Secret(_) => matches!(algorithm, HS256 | HS384 | HS512),
            Self::RsaPem(_) => matches!(algorithm, RS256 | RS384 | RS512 | PS256 | PS384 | PS512),
            Self::EcPem(_) => matches!(algorithm, ES256 | ES384),
            Self::EdPem(_) => algorithm == EdDSA,
        }
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        match self {
            Self::Secret(secret) => Ok(DecodingKey::from_secret(secret)),
            Self::RsaPem(pem) => DecodingKey::from_rsa_pem(pem),
            Self::EcPem(pem) => DecodingKey::from_ec_pem(pem),
            Self::EdPem(pem) => DecodingKey::from_ed_pem(pem),
        }
    }
}

/// Returns the key a token must be verified against.
///
/// Runs after the token header is decoded and before the signature is verified, so a
/// failure here is always a parsing error.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, header: &Header) -> Result<DecodingKey, ValidationError>;
}

/// Adapts a plain closure into a [`KeyResolver`].
pub struct FnKeyResolver<F>(pub F);

#[async_trait]
impl<F> KeyResolver for FnKeyResolver<F>
where
    F: Fn(&Header) -> Result<DecodingKey, ValidationError> + Send + Sync,
{
    async fn resolve(&self, header: &Header) -> Result<DecodingKey, ValidationError> {
        (self.0)(header)
    }
}

#[derive(Clone)]
pub enum KeyStrategy {
    /// One key for every token, whatever `kid` it declares.
    Static {
        key: DecodingKey,
        algorithm: Algorithm,
    },
    /// Key selected by the token's `kid`.
    KeyedMap {
        keys: HashMap<String, DecodingKey>,
        algorithm: Algorithm,
    },
    Custom(Arc<dyn KeyResolver>),
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static { algorithm, .. } => f
                .debug_struct("Static")
                .field("algorithm", algorithm)
                .finish_non_exhaustive(),
            Self::KeyedMap { keys, algorithm } => {
                let mut kids: Vec<_> = keys.keys().collect();
                kids.sort();
                f.debug_struct("KeyedMap")
                    .field("kids", &kids)
                    .field("algorithm", algorithm)
                    .finish()
            }
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl KeyStrategy {
    pub fn from_signing_key(
        key: &SigningKey,
        algorithm: Option<Algorithm>,
    ) -> Result<Self, ConfigError> {
        let algorithm = algorithm.unwrap_or_else(|| key.default_algorithm());
        if !key.supports(algorithm) {
            return Err(ConfigError::AlgorithmMismatch { algorithm });
        }

        Ok(Self::Static {
            key: key.decoding_key().map_err(ConfigError::SigningKey)?,
            algorithm,
        })
    }

    /// Without an explicit algorithm every key must agree on its default one.
    pub fn from_signing_keys(
        keys: &HashMap<String, SigningKey>,
        algorithm: Option<Algorithm>,
    ) -> Result<Self, ConfigError> {
        let algorithm = match algorithm {
            Some(algorithm) => algorithm,
            None => {
                let mut defaults = keys.values().map(SigningKey::default_algorithm);
                let first = defaults.next().unwrap_or(Algorithm::HS256);
                if !defaults.all(|algorithm| algorithm == first) {
                    return Err(ConfigError::AmbiguousAlgorithm);
                }
                first
            }
        };

        let mut decoding_keys = HashMap::with_capacity(keys.len());
        for (kid, key) in keys {
            if !key.supports(algorithm) {
                return Err(ConfigError::AlgorithmMismatch { algorithm });
            }
            let decoding_key = key.decoding_key().map_err(ConfigError::SigningKey)?;
            decoding_keys.insert(kid.clone(), decoding_key);
        }

        Ok(Self::KeyedMap {
            keys: decoding_keys,
            algorithm,
        })
    }
}

fn expect_algorithm(expected: Algorithm, header: &Header) -> Result<(), ValidationError> {
    if header.alg == expected {
        Ok(())
    } else {
        Err(ValidationError::UnexpectedSigningMethod(header.alg))
    }
}

#[async_trait]
impl KeyResolver for KeyStrategy {
    async fn resolve(&self, header: &Header) -> Result<DecodingKey, ValidationError> {
        match self {
            Self::Static { key, algorithm } => {
                expect_algorithm(*algorithm, header)?;
                Ok(key.clone())
            }
            Self::KeyedMap { keys, algorithm } => {
                expect_algorithm(*algorithm, header)?;
                let kid = header.kid.as_deref().ok_or(ValidationError::InvalidKeyId)?;
                keys.get(kid).cloned().ok_or(ValidationError::UnknownKeyId)
            }
            Self::Custom(resolver) => resolver.resolve(header).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(alg: Algorithm, kid: Option<&str>) -> Header {
        let mut header = Header::new(alg);
        header.kid = kid.map(str::to_owned);
        header
    }

    fn keyed(kids: &[&str]) -> KeyStrategy {
        let keys = kids
            .iter()
            .map(|kid| (kid.to_string(), SigningKey::secret(format!("{kid}_secret"))))
            .collect();
        KeyStrategy::from_signing_keys(&keys, None).unwrap()
    }

    #[tokio::test]
    async fn static_key_ignores_kid() {
        let strategy =
            KeyStrategy::from_signing_key(&SigningKey::secret("secret"), None).unwrap();
        assert!(
            strategy
                .resolve(&header(Algorithm::HS256, Some("whatever")))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn static_key_rejects_unexpected_algorithm() {
        let strategy =
            KeyStrategy::from_signing_key(&SigningKey::secret("secret"), Some(Algorithm::HS512))
                .unwrap();
        let err = strategy
            .resolve(&header(Algorithm::HS256, None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unexpected signing method=HS256");
    }

    #[tokio::test]
    async fn keyed_map_selects_by_kid() {
        let strategy = keyed(&["firstOne", "secondOne"]);
        assert!(
            strategy
                .resolve(&header(Algorithm::HS256, Some("secondOne")))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn keyed_map_unknown_and_missing_kid() {
        let strategy = keyed(&["firstOne"]);

        let err = strategy
            .resolve(&header(Algorithm::HS256, Some("thirdOne")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown key id");

        let err = strategy
            .resolve(&header(Algorithm::HS256, None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid key id");
    }

    #[tokio::test]
    async fn custom_resolver_is_consulted() {
        let strategy = KeyStrategy::Custom(Arc::new(FnKeyResolver(|header: &Header| {
            match header.kid.as_deref() {
                Some("dynamic") => Ok(DecodingKey::from_secret(b"dynamic")),
                _ => Err(ValidationError::custom("no such key")),
            }
        })));
        assert!(
            strategy
                .resolve(&header(Algorithm::HS384, Some("dynamic")))
                .await
                .is_ok()
        );
        let err = strategy
            .resolve(&header(Algorithm::HS256, None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no such key");
    }

    #[test]
    fn algorithm_outside_key_family_is_a_build_error() {
        let err = KeyStrategy::from_signing_key(&SigningKey::secret("s"), Some(Algorithm::RS256))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AlgorithmMismatch {
                algorithm: Algorithm::RS256
            }
        ));
    }

    #[test]
    fn invalid_pem_is_a_build_error() {
        let err = KeyStrategy::from_signing_key(&SigningKey::EdPem(b"not a pem".to_vec()), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::SigningKey(_)));
    }

    #[test]
    fn mixed_key_families_need_explicit_algorithm() {
        let keys = HashMap::from([
            ("a".to_string(), SigningKey::secret("s")),
            ("b".to_string(), SigningKey::EdPem(b"pem".to_vec())),
        ]);
        assert!(matches!(
            KeyStrategy::from_signing_keys(&keys, None).unwrap_err(),
            ConfigError::AmbiguousAlgorithm
        ));
    }

    #[test]
    fn signing_key_debug_hides_material() {
        let printed = format!("{:?}", SigningKey::secret("super-secret"));
        assert!(!printed.contains("super-secret"));
    }
}
