use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Response, StatusCode, header};
use serde::Serialize;
use std::convert::Infallible;
use tracing::{debug, warn};

use shared::types::ErrorResponse;

use crate::auth::AuthError;
use crate::handlers::utils::deliver_page::full;

/// Serialize any `Serialize` type and deliver it as a JSON response.
/// All handlers go through this rather than building one-off bodies.
pub fn deliver_serialized_json<T: Serialize>(
    data: &T,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let json = serde_json::to_string(data).context("Failed to serialize response")?;

    debug!(
        "Delivering serialized JSON response, size: {} bytes",
        json.len()
    );

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(json))
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))?;

    Ok(response)
}

/// Delivers a JSON error envelope `{status, code, message}`.
pub fn deliver_error_json(
    error_code: &str,
    message: &str,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if status.is_server_error() {
        warn!("Delivering error JSON: {} - {}", status.as_u16(), error_code);
    } else {
        debug!("Delivering error JSON: {} - {}", status.as_u16(), error_code);
    }

    deliver_serialized_json(&ErrorResponse::new(error_code, message), status)
}

/// Deliver an [`AuthError`] with its code, client-facing text and status.
pub fn deliver_auth_error(err: &AuthError) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(err.to_code(), err.to_message(), err.status())
}
