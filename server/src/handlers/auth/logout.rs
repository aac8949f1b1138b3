use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response};
use tracing::info;

use crate::AppState;
use crate::handlers::utils;

/// `GET /logout`: drop the session, expire the cookie, go home.
/// Works the same whether or not anyone was logged in.
pub async fn handle_logout(
    req: Request<Bytes>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let mut request_session = state
        .sessions
        .resume(req.headers())
        .await
        .context("Failed to resolve session")?;

    if !request_session.is_authenticated() {
        info!("Logout without an active session");
    }

    state
        .sessions
        .clear(&mut request_session)
        .await
        .context("Failed to clear session")?;

    let secure = state.sessions.secure_for(utils::is_https(&req));
    let clear_cookie = state
        .sessions
        .expired_cookie(secure)
        .context("Failed to build logout cookie")?;

    utils::deliver_redirect_with_cookie("/", Some(clear_cookie))
}
