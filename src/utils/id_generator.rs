use rand::{rng, Rng};

use super::hash::{encode_base62, random_base62_char};

/// Length of a session token; 48 base62 characters carry well over 256 bits.
pub const SESSION_TOKEN_LENGTH: usize = 48;

/// Generates a random base62 token of exactly `length` characters, seeded
/// with the base62 encoding of a random 64-bit number.
pub fn generate_token(length: usize) -> String {
    let random_id: u64 = rng().random();
    let mut encoded = encode_base62(random_id);

    while encoded.len() < length {
        encoded.push(random_base62_char());
    }
    encoded.truncate(length);

    encoded
}

pub fn generate_session_token() -> String {
    generate_token(SESSION_TOKEN_LENGTH)
}
