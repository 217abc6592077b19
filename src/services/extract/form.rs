//! Form body buffering for `form` lookup sources.

use axum::body::{Body, Bytes, to_bytes};
use axum::http::{header, request::Parts};

use super::core::{ExtractError, FormFields};

/// Upper bound of a form body buffered for credential lookup.
pub const FORM_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Encoding {
    Urlencoded,
    Multipart { boundary: String },
}

impl Encoding {
    fn of(parts: &Parts) -> Option<Self> {
        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())?;
        let mime = content_type.split(';').next().unwrap_or_default().trim();

        if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            Some(Self::Urlencoded)
        } else if mime.eq_ignore_ascii_case("multipart/form-data") {
            multer::parse_boundary(content_type)
                .ok()
                .map(|boundary| Self::Multipart { boundary })
        } else {
            None
        }
    }
}

/// Buffers `body` and publishes its fields as [`FormFields`], once per request.
///
/// The buffered bytes are put back into `body` for the handler. Non-form bodies are
/// not read and yield no fields.
pub(crate) async fn load(parts: &mut Parts, body: &mut Body) -> Result<(), ExtractError> {
    if parts.extensions.get::<FormFields>().is_some() {
        return Ok(());
    }
    // Recorded up front so a failed read is not retried by a later `form` source.
    parts.extensions.insert(FormFields::default());

    let Some(encoding) = Encoding::of(parts) else {
        return Ok(());
    };

    let bytes = to_bytes(std::mem::take(body), FORM_BODY_LIMIT)
        .await
        .map_err(|err| ExtractError::UnreadableForm(err.to_string()))?;
    *body = Body::from(bytes.clone());

    let fields = match encoding {
        Encoding::Urlencoded => FormFields::parse(&bytes),
        Encoding::Multipart { boundary } => multipart_fields(bytes, boundary)
            .await
            .map_err(|err| ExtractError::UnreadableForm(err.to_string()))?,
    };
    parts.extensions.insert(fields);
    Ok(())
}

// File parts are skipped; only text fields can carry a credential.
async fn multipart_fields(body: Bytes, boundary: String) -> Result<FormFields, multer::Error> {
    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }
        fields.push((name, field.text().await?));
    }
    Ok(FormFields(fields))
}
