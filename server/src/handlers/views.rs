use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};

use shared::types::Session;

use crate::AppState;
use crate::handlers::{pages, utils};

/// `GET /`: logged-in users go straight to their tasks.
pub async fn handle_root(
    req: Request<Bytes>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let request_session = state
        .sessions
        .resume(req.headers())
        .await
        .context("Failed to resolve session")?;

    if request_session.is_authenticated() {
        return utils::deliver_redirect("/tareas");
    }
    utils::deliver_html(pages::render_home(false), StatusCode::OK)
}

/// `GET /tareas`. Only reachable through the protected tier.
pub async fn handle_tareas(
    _req: Request<Bytes>,
    _state: AppState,
    session: Session,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    utils::deliver_html(pages::render_tareas(&session.username), StatusCode::OK)
}
