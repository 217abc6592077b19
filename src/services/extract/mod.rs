/*
 * Responsibility
 * - Locate credential candidates in a request (header / query / param / cookie / form / custom)
 * - Buffer urlencoded / multipart form bodies on demand
 * - Compile the lookup grammar at build time
 */
pub mod core;
pub mod form;
pub mod lookup;

pub use self::core::{
    Candidate, EXTRACTOR_LIMIT, ExtractError, ExtractorChain, FormFields, PathParams,
    ValuesExtractor,
};
pub use form::FORM_BODY_LIMIT;
pub use lookup::{
    DEFAULT_AUTH_SCHEME, DEFAULT_TOKEN_LOOKUP, LookupSource, SourceKind, parse_lookup,
};
