use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

pub const API_KEY_LENGTH: usize = 32;

/// Random 32-character alphanumeric template API key.
pub fn generate_api_key() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// 32 bytes of randomness, hex encoded (64 characters).
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = thread_rng().gen();
    hex::encode(bytes)
}

pub fn is_well_formed_api_key(key: &str) -> bool {
    key.len() == API_KEY_LENGTH && key.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Comparison whose running time does not depend on where the inputs differ.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
