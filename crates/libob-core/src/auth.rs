//! Access token checks shared by every server-side connection.

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

/// Decides whether a request may proceed.
///
/// Authorized when no token is configured (or it is empty), when the
/// `Authorization` header carries the bearer token, or when the
/// `access_token` query parameter matches.
pub fn authorize(
    configured: Option<&str>,
    authorization: Option<&str>,
    query_token: Option<&str>,
) -> bool {
    let Some(expected) = configured.filter(|t| !t.is_empty()) else {
        return true;
    };

    if let Some(token) = authorization.and_then(bearer_token)
        && tokens_match(expected, token)
    {
        return true;
    }
    query_token.is_some_and(|token| tokens_match(expected, token))
}

/// Compares two tokens in time independent of where they differ.
fn tokens_match(expected: &str, given: &str) -> bool {
    let (a, b) = (expected.as_bytes(), given.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
