//! Random tokens: email verification codes and session/CSRF tokens.

use rand::Rng;

/// Length of the numeric email verification token.
pub const VERIFICATION_TOKEN_LEN: usize = 8;

/// Generate a numeric one-time token for email verification.
pub fn generate_verification_token() -> String {
    let mut rng = rand::thread_rng();
    (0..VERIFICATION_TOKEN_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Generate a random opaque token (64 hex characters).
pub fn generate_opaque_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
