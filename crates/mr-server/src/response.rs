//! Response assembly for the stream route.
//!
//! Token verification, header construction, and the status decision live
//! here so the handler only wires resolution, planning, and the body
//! together.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use mr_core::{guess_content_type, mime_extension, Error, ObjectMetadata, ObjectRef, RangeWindow, Result};
use rand::Rng;

/// Fallback MIME type when neither the upstream nor the file name tells us.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Check the capability hash against the object's unique token.
///
/// `provided` must equal the first `len` characters of the token.
pub fn verify_token(
    metadata: &ObjectMetadata,
    object: ObjectRef,
    provided: Option<&str>,
    len: usize,
) -> Result<()> {
    match provided {
        Some(hash) if hash == metadata.token_prefix(len) => Ok(()),
        _ => {
            tracing::debug!(object = %object, "Rejected stream request with invalid hash");
            Err(Error::InvalidToken(object))
        }
    }
}

/// `Content-Type` for the object.
pub fn content_type(metadata: &ObjectMetadata) -> String {
    if let Some(mime) = metadata.mime_type.as_deref().filter(|m| !m.is_empty()) {
        return mime.to_string();
    }
    metadata
        .display_name
        .as_deref()
        .and_then(guess_content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// File name offered in `Content-Disposition`.
///
/// Without a display name this is four random hex characters plus an
/// extension taken from the MIME subtype, or `unknown`.
pub fn attachment_name(metadata: &ObjectMetadata) -> String {
    if let Some(name) = metadata.display_name.as_deref() {
        let cleaned = sanitize_file_name(name);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }

    let token = hex::encode(rand::thread_rng().gen::<[u8; 2]>());
    let ext = metadata
        .mime_type
        .as_deref()
        .and_then(mime_extension)
        .map(sanitize_file_name)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{token}.{ext}")
}

/// Drop characters that would break out of a quoted header parameter.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect::<String>()
        .trim()
        .to_string()
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|e| Error::Internal(format!("invalid header value {value:?}: {e}")))
}

/// Build the success response around `body`.
///
/// `window` is `None` only for an empty object requested without a range.
pub fn assemble(
    metadata: &ObjectMetadata,
    window: Option<&RangeWindow>,
    partial: bool,
    body: Body,
) -> Result<Response> {
    let status = if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let length = window.map(RangeWindow::response_length).unwrap_or(0);
    let disposition = format!("attachment; filename=\"{}\"", attachment_name(metadata));

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, header_value(&content_type(metadata))?)
        .header(header::CONTENT_LENGTH, length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_DISPOSITION, header_value(&disposition)?);

    if let Some(window) = window {
        builder = builder.header(header::CONTENT_RANGE, window.content_range());
    }

    builder
        .body(body)
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}
