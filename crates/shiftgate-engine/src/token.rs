//! Opaque session token and model handle generation.

use chrono::Utc;
use sha2::{Digest, Sha256};

/// Generate a cryptographically random opaque session ID.
///
/// 32 random bytes plus a nanosecond timestamp are hashed with
/// SHA-256 and hex-encoded, yielding 64 characters. The timestamp
/// makes the token unique even under an exhausted entropy pool.
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or(0).to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a random model handle (8 bytes, hex-encoded).
pub fn generate_model_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rand::Rng::random(&mut rng);
    hex::encode(bytes)
}

/// Whether `id` has the shape of a generated session ID.
///
/// Cheap syntactic check only; existence is decided by the store.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == 64 && id.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_64_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_valid_session_id(&id));
    }

    #[test]
    fn session_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
    }

    #[test]
    fn model_ids_are_16_hex_chars() {
        let id = generate_model_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn malformed_session_ids_are_rejected() {
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("short"));
        assert!(!is_valid_session_id(&"g".repeat(64)));
    }
}
