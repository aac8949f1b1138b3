use anyhow::{Result, anyhow};
use hyper::Request;
use hyper::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

/// Extract a header value as a string
pub fn get_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract cookie value by name. Only the name is ever logged.
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let found = headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                (name.trim() == cookie_name).then(|| value.trim().to_string())
            })
        });

    if found.is_none() {
        debug!("Cookie not found: {}", cookie_name);
    }
    found
}

/// Set a cookie with options. Always `SameSite=Lax` so a top-level
/// navigation from another site still carries the session.
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    path: Option<&str>,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue> {
    let mut cookie = format!("{}={}", name, value);

    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }

    if let Some(p) = path {
        cookie.push_str(&format!("; Path={}", p));
    }

    if http_only {
        cookie.push_str("; HttpOnly");
    }

    if secure {
        cookie.push_str("; Secure");
    }

    cookie.push_str("; SameSite=Lax");

    debug!("Setting cookie: {}", name);

    HeaderValue::from_str(&cookie).map_err(|e| {
        warn!("Failed to create cookie header for {}: {}", name, e);
        anyhow!("Invalid cookie value: {}", e)
    })
}

/// Returns true only when the request arrived over a secure (HTTPS) connection.
///
/// Checks, in order:
///   1. `X-Forwarded-Proto: https`, set by most reverse proxies
///   2. `X-Forwarded-Ssl: on`, the Apache-style variant
///   3. The request URI scheme is literally "https"
///
/// Falls back to `false` so plain HTTP dev servers work without any
/// configuration change.
pub fn is_https<B>(req: &Request<B>) -> bool {
    if header_matches(req.headers(), "x-forwarded-proto", "https")
        || header_matches(req.headers(), "x-forwarded-ssl", "on")
    {
        return true;
    }

    req.uri()
        .scheme()
        .map(|s| s.as_str() == "https")
        .unwrap_or(false)
}

/// Check if a header exists and matches a value
pub fn header_matches(headers: &HeaderMap, name: &str, value: &str) -> bool {
    get_header_value(headers, name)
        .map(|v| v.eq_ignore_ascii_case(value))
        .unwrap_or(false)
}

/// Check if the request accepts a specific content type
pub fn accepts_content_type<B>(req: &Request<B>, content_type: &str) -> bool {
    get_header_value(req.headers(), "accept")
        .map(|accept| accept.contains(content_type))
        .unwrap_or(false)
}

/// Add no-cache headers for generated pages
pub fn add_no_cache_headers<T>(mut res: hyper::Response<T>) -> hyper::Response<T> {
    let headers = res.headers_mut();

    headers.insert(
        "cache-control",
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert("pragma", HeaderValue::from_static("no-cache"));
    headers.insert("expires", HeaderValue::from_static("0"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    res
}
