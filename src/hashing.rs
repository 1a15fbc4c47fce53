use sha2::{Digest, Sha256};

/// Raw SHA-256 digest of a UTF-8 string.
pub fn sha256_digest(data: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Lowercase hex SHA-256 of a UTF-8 string.
pub fn sha256_hex(data: &str) -> String {
    hex::encode(sha256_digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_matches_digest() {
        assert_eq!(sha256_hex("x"), hex::encode(sha256_digest("x")));
    }
}
