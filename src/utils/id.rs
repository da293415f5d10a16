use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Hashes a string using Blake3 (8 bytes) and encodes it with base64url (no padding).
/// Returns a stable, compact identifier (~11 characters).
pub fn hash_id(input: &str) -> String {
    let hash = blake3::hash(input.as_bytes());
    let truncated = &hash.as_bytes()[..8];
    URL_SAFE_NO_PAD.encode(truncated)
}

/// Stable integer hash of a string, identical across runs and platforms.
pub fn hash_key(input: &str) -> u32 {
    let hash = blake3::hash(input.as_bytes());
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
