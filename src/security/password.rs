//! Admin password verification.

use subtle::ConstantTimeEq;

/// Compare a submitted password against the configured one in constant time.
/// Length differences short-circuit, which leaks only the length.
pub fn verify(submitted: &str, configured: &str) -> bool {
    submitted.as_bytes().ct_eq(configured.as_bytes()).into()
}
