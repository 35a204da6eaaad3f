//! Shared-secret checks for the webhook routes.

use md5::{Digest, Md5};

/// Plain-secret check: the caller must present the configured secret verbatim.
pub fn authorize(provided: &str, expected: &str) -> bool {
    provided.as_bytes() == expected.as_bytes()
}

/// Hex MD5 of `secret` followed by `text`.
pub fn sign_md5(secret: &str, text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(secret.as_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signed-message check used by `/msg2/`.
///
/// The caller proves knowledge of the secret by sending `md5(secret + text)`
/// as a hex string. Hex case is ignored.
pub fn authorize_md5(provided: &str, expected: &str, text: &str) -> bool {
    sign_md5(expected, text).eq_ignore_ascii_case(provided)
}
