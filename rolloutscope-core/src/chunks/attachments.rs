//! Attachments recovered from base64 data URLs
//!
//! Only `data:<mime>;base64,<payload>` URLs become attachments. The decoded
//! size is estimated from the base64 length before anything is decoded, so
//! oversized payloads are never materialized.

use crate::config::AttachmentLimits;
use crate::types::{AttachmentKind, PreviewReason, UserAttachment};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Marker appended to a text preview that was cut at the character cap.
pub const TRUNCATION_MARKER: &str = "\n… [truncated]";

/// Characters of preview sample kept in a fingerprint.
const FINGERPRINT_SAMPLE_CHARS: usize = 96;

/// Mime types (after `;` parameters are dropped) mapped explicitly.
const MIME_TABLE: &[(&str, AttachmentKind)] = &[
    ("text/markdown", AttachmentKind::Markdown),
    ("text/x-markdown", AttachmentKind::Markdown),
    ("application/markdown", AttachmentKind::Markdown),
    ("application/json", AttachmentKind::Code),
    ("application/javascript", AttachmentKind::Code),
    ("application/typescript", AttachmentKind::Code),
    ("application/x-sh", AttachmentKind::Code),
    ("application/x-python", AttachmentKind::Code),
    ("application/sql", AttachmentKind::Code),
    ("application/toml", AttachmentKind::Code),
    ("application/xml", AttachmentKind::Text),
    ("application/yaml", AttachmentKind::Text),
    ("application/x-yaml", AttachmentKind::Text),
    ("text/csv", AttachmentKind::Text),
    ("text/plain", AttachmentKind::Text),
    ("application/pdf", AttachmentKind::Binary),
    ("application/zip", AttachmentKind::Binary),
    ("application/gzip", AttachmentKind::Binary),
    ("application/x-tar", AttachmentKind::Binary),
    ("application/octet-stream", AttachmentKind::Binary),
    ("application/wasm", AttachmentKind::Binary),
    ("application/msword", AttachmentKind::Binary),
];

/// `text/<subtype>` and `application/<subtype>` subtypes that are source
/// code. An `x-` prefix on the subtype is ignored.
const CODE_SUBTYPES: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "rust",
    "c",
    "c++",
    "csrc",
    "chdr",
    "csharp",
    "java",
    "go",
    "ruby",
    "shellscript",
    "sh",
    "php",
    "swift",
    "kotlin",
    "scala",
    "lua",
    "perl",
    "haskell",
    "css",
    "html",
    "toml",
    "diff",
    "patch",
];

/// Top-level types that are never shown as text.
const BINARY_TOP_LEVEL: &[&str] = &["audio", "video", "font"];

/// Classify a mime type.
pub fn classify_mime(mime: &str) -> AttachmentKind {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if let Some((_, kind)) = MIME_TABLE.iter().find(|(m, _)| *m == essence) {
        return *kind;
    }

    let Some((top, subtype)) = essence.split_once('/') else {
        return AttachmentKind::Unknown;
    };
    let is_code = CODE_SUBTYPES.contains(&subtype.strip_prefix("x-").unwrap_or(subtype));

    match top {
        "image" => AttachmentKind::Image,
        "text" if is_code => AttachmentKind::Code,
        "text" => AttachmentKind::Text,
        "application" if is_code => AttachmentKind::Code,
        "application" if subtype.ends_with("+json") => AttachmentKind::Code,
        "application" if subtype.ends_with("+xml") => AttachmentKind::Text,
        t if BINARY_TOP_LEVEL.contains(&t) => AttachmentKind::Binary,
        _ => AttachmentKind::Unknown,
    }
}

/// Decoded byte length implied by a base64 payload, without decoding it.
pub fn estimate_decoded_size(payload: &str) -> u64 {
    let significant = payload.bytes().filter(|b| !b.is_ascii_whitespace()).count() as u64;
    let padding = payload
        .bytes()
        .rev()
        .filter(|b| !b.is_ascii_whitespace())
        .take_while(|b| *b == b'=')
        .count() as u64;
    (significant / 4 * 3 + (significant % 4) * 3 / 4).saturating_sub(padding)
}

/// Split a data URL into `(mime, base64 payload)`.
///
/// Returns `None` for anything that is not a base64 data URL.
pub fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return None;
    }
    Some((mime, payload))
}

/// Build an attachment from a data URL. Non-base64 URLs yield `None`.
pub fn attachment_from_data_url(url: &str, limits: &AttachmentLimits) -> Option<UserAttachment> {
    let (mime, payload) = split_data_url(url)?;
    let mime_type = mime.to_ascii_lowercase();
    let kind = classify_mime(&mime_type);
    let size_bytes = estimate_decoded_size(payload);

    let mut attachment = UserAttachment {
        kind,
        mime_type,
        size_bytes,
        previewable: false,
        preview_reason: None,
        text_preview: None,
        truncated: false,
        data_url: None,
    };

    if size_bytes > limits.max_preview_bytes {
        attachment.preview_reason = Some(PreviewReason::TooLarge);
        return Some(attachment);
    }

    let bytes = match decode_payload(payload) {
        Some(bytes) => bytes,
        None => {
            tracing::debug!(mime = %attachment.mime_type, "Attachment payload is not valid base64");
            attachment.preview_reason = Some(PreviewReason::DecodeError);
            return Some(attachment);
        }
    };
    attachment.size_bytes = bytes.len() as u64;

    match kind {
        AttachmentKind::Image => {
            attachment.previewable = true;
            attachment.data_url = Some(url.to_string());
        }
        kind if kind.is_textual() => {
            match String::from_utf8(bytes) {
                Ok(text) => {
                    let (preview, truncated) = truncate_chars(&text, limits.max_text_chars);
                    attachment.previewable = true;
                    attachment.text_preview = Some(preview);
                    attachment.truncated = truncated;
                }
                Err(_) => attachment.preview_reason = Some(PreviewReason::DecodeError),
            }
        }
        AttachmentKind::Binary => attachment.preview_reason = Some(PreviewReason::Binary),
        _ => attachment.preview_reason = Some(PreviewReason::UnsupportedMime),
    }

    Some(attachment)
}

fn decode_payload(payload: &str) -> Option<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact.as_bytes()).ok()
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}{}", &text[..cut], TRUNCATION_MARKER), true),
        None => (text.to_string(), false),
    }
}

/// Identity used to de-duplicate attachments that arrive through two
/// channels: mime, kind, size, then up to 96 characters of preview sample.
pub fn fingerprint(attachment: &UserAttachment) -> String {
    let sample_source = attachment
        .text_preview
        .as_deref()
        .or_else(|| {
            attachment
                .data_url
                .as_deref()
                .and_then(split_data_url)
                .map(|(_, payload)| payload)
        })
        .unwrap_or_default();
    let sample: String = sample_source.chars().take(FINGERPRINT_SAMPLE_CHARS).collect();

    format!(
        "{}|{}|{}|{}",
        attachment.mime_type, attachment.kind, attachment.size_bytes, sample
    )
}
