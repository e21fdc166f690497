use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

/// Random bytes behind every verification and reset token.
pub const TOKEN_BYTES: usize = 20;

/// Fresh single-use token, hex encoded.
pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Compares a caller-supplied secret with the configured one without
/// short-circuiting on the first differing byte.
pub fn secrets_match(supplied: &str, expected: &str) -> bool {
    supplied.as_bytes().ct_eq(expected.as_bytes()).into()
}
