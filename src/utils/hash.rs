use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rng, Rng};
use sha2::{Digest, Sha256};

const API_KEY_PREFIX: &str = "sk_";

/// Hex-encoded SHA-256 of a plaintext API key, as stored in `api_keys.key_hash`
pub fn hash_api_key(raw_key: &str) -> String {
    let digest = Sha256::digest(raw_key.as_bytes());
    format!("{:x}", digest)
}

/// Generates a fresh plaintext API key (`sk_` + 32 random bytes, URL-safe base64)
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn generated_keys_are_prefixed_and_distinct() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with(API_KEY_PREFIX));
        assert_ne!(a, b);
        assert_eq!(hash_api_key(&a).len(), 64);
    }
}
