//! Shared key generation for storage backends.
//!
//! Key format: `uploads/{file_id}{ext}`, where the extension is taken from the
//! original filename and lowercased. The UUID makes every key unique per upload.

use uuid::Uuid;

/// Generate the storage key for an uploaded file.
pub fn generate_object_key(file_id: Uuid, filename: &str) -> String {
    match extension_of(filename) {
        Some(ext) => format!("uploads/{}{}", file_id, ext),
        None => format!("uploads/{}", file_id),
    }
}

/// Lowercased extension of a filename including the dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Some(format!(".{}", ext.to_lowercase()))
        }
        _ => None,
    }
}
