use sha3::{Digest, Sha3_256};

/// Compute SHA3-256 of arbitrary bytes → 32-byte array.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA3-256 of a UTF-8 string, rendered as lowercase hex.
/// Transaction identifiers are produced with this.
pub fn sha3_hex(data: &str) -> String {
    hex::encode(sha3_256(data.as_bytes()))
}
