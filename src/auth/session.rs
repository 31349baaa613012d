//! Session cookie carrying the access token for browser clients.

use axum::http::{header, HeaderMap, HeaderValue};

pub const COOKIE_NAME: &str = "smartcity_session";

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!(
        "{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// `Set-Cookie` value that expires the session immediately.
pub fn clear_cookie(secure: bool) -> HeaderValue {
    let value = if secure {
        "smartcity_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure"
    } else {
        "smartcity_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
    };
    HeaderValue::from_static(value)
}

/// Session token from the `Cookie` headers, if any.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Bearer token from the `Authorization` header, if any.
pub fn token_from_bearer(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_carries_flags() {
        let value = session_cookie("abc.def", 600, false).unwrap();
        let s = value.to_str().unwrap();
        assert!(s.starts_with("smartcity_session=abc.def;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("SameSite=Lax"));
        assert!(s.contains("Max-Age=600"));
        assert!(!s.contains("Secure"));

        let secure = session_cookie("abc", 1, true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
        assert!(clear_cookie(true).to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("lang=en; smartcity_session=tok123; x=1"),
        );
        assert_eq!(token_from_cookies(&headers), Some("tok123"));
    }

    #[test]
    fn empty_session_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("smartcity_session="));
        assert_eq!(token_from_cookies(&headers), None);
    }

    #[test]
    fn reads_bearer_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_bearer(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_bearer(&headers), Some("xyz"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(token_from_bearer(&headers), None);
    }
}
