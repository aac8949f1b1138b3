use std::convert::Infallible;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use http::HeaderValue;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::{Response, StatusCode, header};
use tracing::{debug, error, info};

use crate::handlers::utils::headers;

/// Deliver a rendered HTML page with no-cache and `nosniff` headers.
pub fn deliver_html<T: Into<Bytes>>(
    html: T,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let content: Bytes = html.into();

    debug!(
        "Delivering HTML page with status: {}, size: {} bytes",
        status,
        content.len()
    );

    let response: Response<BoxBody<Bytes, Infallible>> = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(full(content))
        .map_err(|e| anyhow!("Failed to build response: {}", e))?;

    Ok(headers::add_no_cache_headers(response))
}

/// Delivers a redirect response
pub fn deliver_redirect(location: &str) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_redirect_with_cookie(location, None)
}

/// Delivers a redirect response, optionally setting a cookie on the way
pub fn deliver_redirect_with_cookie(
    location: &str,
    cookie: Option<HeaderValue>,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Delivering redirect to: {}", location);

    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location);

    if let Some(c) = cookie {
        builder = builder.header(header::SET_COOKIE, c);
    }
    let response = builder.body(empty()).map_err(|e: http::Error| {
        error!("Failed to build redirect response to {}: {}", location, e);
        anyhow!("Failed to build redirect response: {}", e)
    })?;

    Ok(headers::add_no_cache_headers(response))
}

/// Helper function to create an empty body
pub fn empty() -> BoxBody<Bytes, Infallible> {
    Empty::<Bytes>::new().boxed()
}

/// Helper function to create a full body from various types
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    Full::new(chunk.into()).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_has_content_type_and_no_cache() {
        let res = deliver_html("<p>hi</p>", StatusCode::UNAUTHORIZED).unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert!(
            res.headers()["cache-control"]
                .to_str()
                .unwrap()
                .contains("no-store")
        );
    }

    #[test]
    fn redirect_sets_location_and_optional_cookie() {
        let res = deliver_redirect("/").unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/");
        assert!(res.headers().get(header::SET_COOKIE).is_none());

        let res = deliver_redirect_with_cookie(
            "/tareas",
            Some(HeaderValue::from_static("session_id=x")),
        )
        .unwrap();
        assert_eq!(res.headers()[header::SET_COOKIE], "session_id=x");
    }
}
