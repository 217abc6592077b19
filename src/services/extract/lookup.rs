//! Credential lookup sources and the `source:name[:prefix]` grammar.
//!
//! A lookup string such as `header:Authorization:Bearer ,query:token` compiles once, at
//! build time, into an ordered list of [`LookupSource`]. Nothing here runs per request.

use std::{fmt, sync::Arc};

use axum::http::{HeaderName, header, request::Parts};

use super::core::{ExtractError, FnExtractor, ValuesExtractor};
use crate::config::ConfigError;

/// Lookup used when the configuration leaves `token_lookup` empty.
pub const DEFAULT_TOKEN_LOOKUP: &str = "header:Authorization:Bearer ";

/// Prefix applied to `header:Authorization` when the entry names no prefix.
pub const DEFAULT_AUTH_SCHEME: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Header,
    Query,
    Param,
    Cookie,
    Form,
    Custom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::Query => "query",
            Self::Param => "param",
            Self::Cookie => "cookie",
            Self::Form => "form",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// One place in a request where a credential may live.
#[derive(Clone)]
pub enum LookupSource {
    /// Request header. `prefix` (matched case-insensitively) is stripped from the value.
    Header { name: HeaderName, prefix: String },
    Query { name: String },
    /// Path parameter of the matched route.
    Param { name: String },
    Cookie { name: String },
    /// Field of an `application/x-www-form-urlencoded` body.
    Form { name: String },
    /// Caller-supplied extractor.
    Custom {
        name: String,
        extractor: Arc<dyn ValuesExtractor>,
    },
}

impl LookupSource {
    /// Wraps a closure as a custom source. `name` only shows up in diagnostics.
    pub fn custom<F>(name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&Parts) -> Result<Vec<String>, ExtractError> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            extractor: Arc::new(FnExtractor(extractor)),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Header { .. } => SourceKind::Header,
            Self::Query { .. } => SourceKind::Query,
            Self::Param { .. } => SourceKind::Param,
            Self::Cookie { .. } => SourceKind::Cookie,
            Self::Form { .. } => SourceKind::Form,
            Self::Custom { .. } => SourceKind::Custom,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Header { name, .. } => name.as_str(),
            Self::Query { name }
            | Self::Param { name }
            | Self::Cookie { name }
            | Self::Form { name }
            | Self::Custom { name, .. } => name,
        }
    }
}

impl fmt::Debug for LookupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header { name, prefix } => f
                .debug_struct("Header")
                .field("name", name)
                .field("prefix", prefix)
                .finish(),
            other => f
                .debug_struct(match other.kind() {
                    SourceKind::Query => "Query",
                    SourceKind::Param => "Param",
                    SourceKind::Cookie => "Cookie",
                    SourceKind::Form => "Form",
                    _ => "Custom",
                })
                .field("name", &other.name())
                .finish(),
        }
    }
}

impl PartialEq for LookupSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Header { name, prefix },
                Self::Header {
                    name: other_name,
                    prefix: other_prefix,
                },
            ) => name == other_name && prefix == other_prefix,
            (
                Self::Custom { name, extractor },
                Self::Custom {
                    name: other_name,
                    extractor: other_extractor,
                },
            ) => name == other_name && Arc::ptr_eq(extractor, other_extractor),
            (a, b) => a.kind() == b.kind() && a.name() == b.name(),
        }
    }
}

/// Compiles a lookup string into sources, in string order.
///
/// An empty (or blank) string yields [`DEFAULT_TOKEN_LOOKUP`].
pub fn parse_lookup(lookup: &str) -> Result<Vec<LookupSource>, ConfigError> {
    let lookup = if lookup.trim().is_empty() {
        DEFAULT_TOKEN_LOOKUP
    } else {
        lookup
    };

    lookup.split(',').map(parse_entry).collect()
}

fn parse_entry(entry: &str) -> Result<LookupSource, ConfigError> {
    // Only leading whitespace is insignificant: a prefix may end with a space.
    let entry = entry.trim_start();

    let Some((source, rest)) = entry.split_once(':') else {
        return Err(ConfigError::LookupParts(entry.to_string()));
    };
    let (name, prefix) = match rest.split_once(':') {
        Some((name, prefix)) => (name.trim(), Some(prefix)),
        None => (rest.trim(), None),
    };
    if name.is_empty() {
        return Err(ConfigError::LookupParts(entry.to_string()));
    }
    if prefix.is_some() && source != "header" {
        return Err(ConfigError::LookupPrefix(entry.to_string()));
    }

    let name = name.to_string();
    match source {
        "header" => {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::LookupHeader(name.clone()))?;
            let prefix = match prefix {
                Some(prefix) => prefix.to_string(),
                None if header_name == header::AUTHORIZATION => DEFAULT_AUTH_SCHEME.to_string(),
                None => String::new(),
            };
            Ok(LookupSource::Header {
                name: header_name,
                prefix,
            })
        }
        "query" => Ok(LookupSource::Query { name }),
        "param" => Ok(LookupSource::Param { name }),
        "cookie" => Ok(LookupSource::Cookie { name }),
        "form" => Ok(LookupSource::Form { name }),
        other => Err(ConfigError::LookupSource(other.to_string())),
    }
}
