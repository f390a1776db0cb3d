use http::HeaderMap;

use crate::api::server::RouteError;
use crate::util::constant_time_cmp;

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Accepts the shared secret from either the `api_key` query parameter or the `X-API-KEY`
/// header, in that order. Runs before the request body is even parsed.
pub fn verify_shared_secret(
    query_key: Option<&str>,
    headers: &HeaderMap,
    expected: &str,
) -> Result<(), RouteError> {
    let provided = query_key
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()))
        .unwrap_or_default();

    if provided.is_empty() || !constant_time_cmp(provided, expected) {
        tracing::warn!(key_present = !provided.is_empty(), "rejected shared secret");
        return Err(RouteError::Unauthorized);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_secret_sources() {
        let mut headers = HeaderMap::new();
        assert!(verify_shared_secret(Some("hunter2"), &headers, "hunter2").is_ok());
        assert!(verify_shared_secret(None, &headers, "hunter2").is_err());
        assert!(verify_shared_secret(Some(""), &headers, "hunter2").is_err());

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("hunter2"));
        assert!(verify_shared_secret(None, &headers, "hunter2").is_ok());

        // the query parameter wins when both are present
        assert!(verify_shared_secret(Some("wrong"), &headers, "hunter2").is_err());
    }
}
