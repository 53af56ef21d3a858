//! Request helpers shared by the web front end.

/// Extract the first client IP from an X-Forwarded-For header value.
///
/// Pass the raw header value (e.g., `headers.get("x-forwarded-for")`).
/// Returns the first (leftmost) IP, which is the original client.
///
/// `X-Forwarded-For` is client-controlled. The value is only recorded on sessions
/// and in logs.
pub fn extract_client_ip(forwarded_for: Option<&str>) -> Option<String> {
    forwarded_for
        .map(|s| s.split(',').next().unwrap_or("").trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Client IP from `X-Forwarded-For`, falling back to `X-Real-IP`.
pub fn client_ip(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Option<String> {
    extract_client_ip(forwarded_for).or_else(|| {
        real_ip
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}
