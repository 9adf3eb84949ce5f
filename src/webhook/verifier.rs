//! Timing-safe token verification for inbound callbacks.

const BEARER_PREFIX: &str = "Bearer ";

/// Check a presented token against the expected one.
///
/// A leading `"Bearer "` (case-sensitive) is stripped from `received`.
/// Absent or empty inputs never match. The content comparison does not
/// exit early on the first differing byte.
pub fn verify(received: Option<&str>, expected: &str) -> bool {
    let Some(received) = received else {
        return false;
    };
    let token = received.strip_prefix(BEARER_PREFIX).unwrap_or(received);

    if token.is_empty() || expected.is_empty() {
        return false;
    }

    constant_time_eq(token.as_bytes(), expected.as_bytes())
}

/// Byte equality whose running time depends only on the input lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    std::hint::black_box(diff) == 0
}
