//! Room code generation and normalization

use rand::Rng;

/// Length of generated room codes
pub const CODE_LENGTH: usize = 6;

/// Longest code accepted from a client
pub const MAX_CODE_LENGTH: usize = 12;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random human-typeable room code
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Canonical form of a client-supplied code (trimmed, uppercase).
/// Returns None for codes that could never have been generated or typed sensibly.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty()
        || code.len() > MAX_CODE_LENGTH
        || !code.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(code)
}
