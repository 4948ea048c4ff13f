//! Object key construction.
//!
//! Document keys combine owner, timestamp, a random nonce and the file
//! name, so two uploads never share a key. Asset keys
//! are derived from the content digest so identical bytes always map to the
//! same key.

use certa_types::WalletAddress;

use crate::error::{StoreError, StoreResult};

const MAX_FILE_NAME_LEN: usize = 128;

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `{owner_hex}/{timestamp_ms}_{nonce}_{sanitized_file_name}` with a
/// 6-hex-digit random nonce.
pub fn document_key(owner: &WalletAddress, timestamp_ms: i64, file_name: &str) -> String {
    let nonce = rand::random::<u32>() & 0x00ff_ffff;
    format!(
        "{}/{}_{:06x}_{}",
        owner.to_hex(),
        timestamp_ms,
        nonce,
        sanitize_file_name(file_name)
    )
}

/// `{digest_hex}.{ext}`; falls back to `bin` for missing or odd extensions.
pub fn asset_key(digest_hex: &str, extension: Option<&str>) -> String {
    let ext = extension
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("{digest_hex}.{}", ext.to_ascii_lowercase())
}

/// `{digest_hex}.json`.
pub fn metadata_key(digest_hex: &str) -> String {
    format!("{digest_hex}.json")
}

/// Reject keys that are empty, absolute, or escape their bucket.
pub fn validate_key(path: &str) -> StoreResult<()> {
    if path.is_empty() {
        return Err(StoreError::InvalidKey("empty key".into()));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(StoreError::InvalidKey(format!("not a relative key: {path}")));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::InvalidKey(format!("bad segment in key: {path}")));
    }
    Ok(())
}
