use rand::{rng, Rng};

pub const BASE62_ALPHABET: &[u8] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of server-generated short codes
pub const DEFAULT_CODE_LENGTH: usize = 7;

/// Generates a random base62 short code of exactly `length` characters
pub fn generate_short_code(length: usize) -> String {
    let mut rng = rng();
    (0..length)
        .map(|_| BASE62_ALPHABET[rng.random_range(0..BASE62_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_have_requested_length_and_alphabet() {
        for len in [1, 6, DEFAULT_CODE_LENGTH, 8] {
            let code = generate_short_code(len);
            assert_eq!(code.len(), len);
            assert!(code.bytes().all(|b| BASE62_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_are_not_trivially_repeated() {
        let codes: HashSet<String> = (0..200)
            .map(|_| generate_short_code(DEFAULT_CODE_LENGTH))
            .collect();
        assert!(codes.len() > 190);
    }
}
