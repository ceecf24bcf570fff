use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rng, Rng};
use sha2::{Digest, Sha256};

const CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Converts a number to base62 representation (0-9, A-Z, a-z)
pub fn encode_base62(mut num: u64) -> String {
    const BASE: u64 = 62;

    if num == 0 {
        return "0".to_string();
    }

    let mut result = Vec::new();
    while num > 0 {
        result.push(CHARSET[(num % BASE) as usize] as char);
        num /= BASE;
    }

    result.iter().rev().collect()
}

/// Generates a random base62 character
pub fn random_base62_char() -> char {
    let idx = rng().random_range(0..CHARSET.len());
    CHARSET[idx] as char
}

/// Digest of a session token as stored in the database. The raw token only
/// ever lives in the client's cookie.
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
