//! Key handling shared by the upload tree and the document store.

use marquee_core::models::MediaKind;

/// Storage key for a managed upload: `{kind folder}/{stored name}`.
pub fn storage_key(kind: MediaKind, stored_name: &str) -> String {
    format!("{}/{}", kind.folder(), stored_name)
}

/// Strip every character outside `[A-Za-z0-9_-]`.
///
/// Keys that sanitize to the empty string are unusable and callers must treat
/// them as invalid.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
