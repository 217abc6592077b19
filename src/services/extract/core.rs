//! Extractor chain: probes lookup sources in order and returns credential candidates.
//!
//! Sources read from `Parts`; nothing here knows about validation. Path parameters come
//! from the [`PathParams`] extension inserted by the axum middleware. Form fields come
//! from [`FormFields`], which [`ExtractorChain::extract`] fills from the body the
//! first time a `form` source is reached.

use axum::body::Body;
use axum::http::{HeaderName, header, request::Parts};

use super::form;
use super::lookup::{LookupSource, SourceKind};
use crate::error::TokenExtractionError;

/// Upper bound of values taken from a single multi-valued source.
pub const EXTRACTOR_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("missing value in header")]
    MissingHeader,
    #[error("invalid value in header")]
    InvalidHeader,
    #[error("missing value in the query string")]
    MissingQuery,
    #[error("missing value in path params")]
    MissingParam,
    #[error("missing value in cookies")]
    MissingCookie,
    #[error("missing value in the form")]
    MissingForm,
    #[error("unreadable form body: {0}")]
    UnreadableForm(String),
    #[error("missing value in {0}")]
    MissingCustom(String),
    #[error("no credential sources configured")]
    NoSources,
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// True when a value was found but unusable, as opposed to simply absent.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader | Self::UnreadableForm(_) | Self::Custom(_)
        )
    }
}

/// Reads candidate credential strings from a request.
pub trait ValuesExtractor: Send + Sync {
    fn extract(&self, parts: &Parts) -> Result<Vec<String>, ExtractError>;
}

pub(crate) struct FnExtractor<F>(pub(crate) F);

impl<F> ValuesExtractor for FnExtractor<F>
where
    F: Fn(&Parts) -> Result<Vec<String>, ExtractError> + Send + Sync,
{
    fn extract(&self, parts: &Parts) -> Result<Vec<String>, ExtractError> {
        (self.0)(parts)
    }
}

/// Path parameters of the matched route.
#[derive(Debug, Clone, Default)]
pub struct PathParams(pub Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Text fields of a urlencoded or multipart form body.
#[derive(Debug, Clone, Default)]
pub struct FormFields(pub Vec<(String, String)>);

impl FormFields {
    pub fn parse(body: &[u8]) -> Self {
        Self(url::form_urlencoded::parse(body).into_owned().collect())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }
}

/// A credential string and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub source: SourceKind,
}

impl LookupSource {
    /// Probes this source. An absent value is an error naming the source, never an
    /// empty `Ok`.
    pub fn extract(&self, parts: &Parts) -> Result<Vec<String>, ExtractError> {
        match self {
            Self::Header { name, prefix } => values_from_header(parts, name, prefix),
            Self::Query { name } => values_from_query(parts, name),
            Self::Param { name } => parts
                .extensions
                .get::<PathParams>()
                .and_then(|params| params.get(name))
                .filter(|value| !value.is_empty())
                .map(|value| vec![value.to_owned()])
                .ok_or(ExtractError::MissingParam),
            Self::Cookie { name } => value_from_cookie(parts, name)
                .map(|value| vec![value])
                .ok_or(ExtractError::MissingCookie),
            Self::Form { name } => parts
                .extensions
                .get::<FormFields>()
                .and_then(|fields| fields.get(name))
                .map(|value| vec![value.to_owned()])
                .ok_or(ExtractError::MissingForm),
            Self::Custom { name, extractor } => {
                let values: Vec<String> = extractor
                    .extract(parts)?
                    .into_iter()
                    .filter(|value| !value.is_empty())
                    .collect();
                if values.is_empty() {
                    Err(ExtractError::MissingCustom(name.clone()))
                } else {
                    Ok(values)
                }
            }
        }
    }
}

fn values_from_header(
    parts: &Parts,
    name: &HeaderName,
    prefix: &str,
) -> Result<Vec<String>, ExtractError> {
    let mut present = false;
    let mut values = Vec::new();

    for raw in parts.headers.get_all(name).iter().take(EXTRACTOR_LIMIT) {
        present = true;
        let Ok(raw) = raw.to_str() else {
            continue;
        };
        if let Some(token) = strip_scheme(raw, prefix) {
            values.push(token.to_owned());
        }
    }

    match (present, values.is_empty()) {
        (false, _) => Err(ExtractError::MissingHeader),
        (true, true) => Err(ExtractError::InvalidHeader),
        (true, false) => Ok(values),
    }
}

// Scheme comparison is case-insensitive (RFC 7235 2.1); the credential must be non-empty.
fn strip_scheme<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let scheme = value.get(..prefix.len())?;
    if !scheme.eq_ignore_ascii_case(prefix) {
        return None;
    }
    value.get(prefix.len()..).filter(|rest| !rest.is_empty())
}

fn values_from_query(parts: &Parts, name: &str) -> Result<Vec<String>, ExtractError> {
    let values: Vec<String> = parts
        .uri
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter_map(|(key, value)| {
                    (key == name && !value.is_empty()).then(|| value.into_owned())
                })
                .take(EXTRACTOR_LIMIT)
                .collect()
        })
        .unwrap_or_default();

    if values.is_empty() {
        Err(ExtractError::MissingQuery)
    } else {
        Ok(values)
    }
}

fn value_from_cookie(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"')))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}

/// Ordered, immutable list of sources compiled from the configuration.
#[derive(Debug, Clone)]
pub struct ExtractorChain {
    sources: Vec<LookupSource>,
}

impl ExtractorChain {
    pub fn new(sources: Vec<LookupSource>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[LookupSource] {
        &self.sources
    }

    /// Returns the candidates of the first source that yields any.
    ///
    /// Later sources are not probed once one yields, so the form body is only buffered
    /// when a `form` source is actually reached. When every source comes up empty the
    /// most specific diagnostic is reported: a malformed value beats an absent one,
    /// otherwise the last source wins.
    pub async fn extract(
        &self,
        parts: &mut Parts,
        body: &mut Body,
    ) -> Result<Vec<Candidate>, TokenExtractionError> {
        let mut diagnostic: Option<ExtractError> = None;

        for source in &self.sources {
            if source.kind() == SourceKind::Form {
                if let Err(err) = form::load(parts, body).await {
                    remember(&mut diagnostic, err);
                    continue;
                }
            }
            match probe(source, parts) {
                Ok(candidates) => return Ok(candidates),
                Err(err) => remember(&mut diagnostic, err),
            }
        }

        Err(TokenExtractionError::new(
            diagnostic.unwrap_or(ExtractError::NoSources),
        ))
    }
}

fn probe(source: &LookupSource, parts: &Parts) -> Result<Vec<Candidate>, ExtractError> {
    match source.extract(parts) {
        Ok(values) => Ok(values
            .into_iter()
            .map(|value| Candidate {
                value,
                source: source.kind(),
            })
            .collect()),
        Err(err) => {
            tracing::trace!(
                source = %source.kind(),
                name = source.name(),
                error = %err,
                "lookup source yielded nothing"
            );
            Err(err)
        }
    }
}

fn remember(slot: &mut Option<ExtractError>, err: ExtractError) {
    if slot
        .as_ref()
        .is_some_and(|previous| previous.is_malformed() && !err.is_malformed())
    {
        return;
    }
    *slot = Some(err);
}
