use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::header::{CONTENT_TYPE, HeaderValue, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use tracing::{error, info, warn};

use shared::types::{CredentialsPayload, MessageResponse, User};

use crate::AppState;
use crate::auth::AuthError;
use crate::handlers::{pages, utils};

/// Pick the body parser from the declared content type. JSON is the
/// default; malformed bodies become an empty submission.
fn parse_credentials(req: &Request<Bytes>) -> CredentialsPayload {
    let is_form = utils::get_header_value(req.headers(), CONTENT_TYPE.as_str())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        CredentialsPayload::from_form(req.body())
    } else {
        CredentialsPayload::from_json(req.body())
    }
}

/// Replace whatever session the request carried with a fresh one for `user`
/// and return the cookie to set.
async fn start_session(req: &Request<Bytes>, state: &AppState, user: &User) -> Result<HeaderValue> {
    let mut previous = state
        .sessions
        .resume(req.headers())
        .await
        .context("Failed to resolve existing session")?;
    if previous.has_token() {
        state
            .sessions
            .clear(&mut previous)
            .await
            .context("Failed to clear previous session")?;
    }

    let token = state
        .sessions
        .establish(user)
        .await
        .context("Failed to create session")?;

    let secure = state.sessions.secure_for(utils::is_https(req));
    state
        .sessions
        .cookie(&token, secure)
        .context("Failed to create session cookie")
}

/// `POST /login`: JSON API login.
pub async fn handle_login(
    req: Request<Bytes>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing login request");

    let payload = parse_credentials(&req);

    match state
        .credentials
        .authenticate(payload.username(), payload.password())
        .await
    {
        Ok(user) => {
            let cookie = start_session(&req, &state, &user).await?;

            let mut response = utils::deliver_serialized_json(
                &MessageResponse::success("Login exitoso."),
                StatusCode::OK,
            )?;
            response.headers_mut().insert(SET_COOKIE, cookie);
            Ok(response)
        }
        Err(err) => {
            if matches!(err, AuthError::Store(_) | AuthError::Hashing(_)) {
                error!("Login failed internally: {}", err);
            }
            utils::deliver_auth_error(&err)
        }
    }
}

/// `GET /login_home`: the login form.
pub async fn handle_login_page(
    req: Request<Bytes>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let logged_in = state
        .sessions
        .resume(req.headers())
        .await
        .context("Failed to resolve session")?
        .is_authenticated();

    utils::deliver_html(pages::render_login(logged_in), StatusCode::OK)
}

/// `POST /login_home`: browser form login. Redirects to the tasks view on
/// success, shows the "not logged in" page otherwise.
pub async fn handle_login_form(
    req: Request<Bytes>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing form login request");

    let payload = CredentialsPayload::from_form(req.body());

    match state
        .credentials
        .authenticate(payload.username(), payload.password())
        .await
    {
        Ok(user) => {
            let cookie = start_session(&req, &state, &user).await?;
            utils::deliver_redirect_with_cookie("/tareas", Some(cookie))
        }
        Err(AuthError::InvalidCredentials) => {
            warn!("Form login rejected");
            pages::deliver_unauthorized_page()
        }
        Err(err) => Err(err).context("Form login failed"),
    }
}
