//! Cryptographic utilities for email verification codes.

use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Smallest code that can be issued (six digits, no leading zero).
pub const VALIDATION_CODE_MIN: u32 = 100_000;

/// Largest code that can be issued.
pub const VALIDATION_CODE_MAX: u32 = 999_999;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a uniformly random six digit validation code.
pub fn generate_validation_code() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(VALIDATION_CODE_MIN..=VALIDATION_CODE_MAX)
        .to_string()
}

/// Alphabet for public widget codes (no easily confused characters).
const WIDGET_CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Length of a generated widget code.
pub const WIDGET_CODE_LENGTH: usize = 12;

/// Generates the opaque public identifier under which a form is embedded.
pub fn generate_widget_code() -> String {
    let mut rng = rand::thread_rng();
    (0..WIDGET_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..WIDGET_CODE_ALPHABET.len());
            WIDGET_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Hashes a validation code bound to the submission it was issued for.
///
/// Codes are only six digits, so the submission id acts as a per-row salt:
/// the same digits issued for two submissions never share a stored hash.
pub fn hash_validation_code(submission_id: Uuid, code: &str) -> String {
    sha256_hex(&format!("{}:{}", submission_id, code.trim()))
}

/// Returns true when the input looks like a validation code (exactly six ASCII digits).
pub fn is_validation_code_format(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}
