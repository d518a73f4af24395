//! Object metadata and MIME helpers.

use serde::{Deserialize, Serialize};

/// Metadata describing one remote media object.
///
/// Resolved fresh for each request (or served from the adapter's short-lived
/// cache) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Stable content identity. Its prefix doubles as the capability hash.
    pub unique_token: String,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// MIME type reported by the upstream, if any.
    pub mime_type: Option<String>,
    /// File name as uploaded, if any.
    pub display_name: Option<String>,
}

impl ObjectMetadata {
    /// The first `len` characters of the unique token.
    ///
    /// Returns the whole token when it is shorter than `len`.
    pub fn token_prefix(&self, len: usize) -> &str {
        match self.unique_token.char_indices().nth(len) {
            Some((idx, _)) => &self.unique_token[..idx],
            None => &self.unique_token,
        }
    }
}

/// Guess the MIME type from a file name's extension.
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;

    let mime = match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "ts" | "m2ts" => "video/mp2t",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "srt" => "application/x-subrip",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// File extension implied by a MIME type: its subtype, e.g. `mp4` for `video/mp4`.
pub fn mime_extension(mime_type: &str) -> Option<&str> {
    let (_, subtype) = mime_type.split_once('/')?;
    let subtype = subtype.split(';').next().unwrap_or("").trim();
    if subtype.is_empty() {
        None
    } else {
        Some(subtype)
    }
}
