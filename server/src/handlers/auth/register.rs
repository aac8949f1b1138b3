use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tracing::{error, info, warn};

use shared::types::{CredentialsPayload, MessageResponse};

use crate::AppState;
use crate::auth::AuthError;
use crate::handlers::utils;

/// `POST /registro`
pub async fn handle_register(
    req: Request<Bytes>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing registration request");

    let payload = CredentialsPayload::from_json(req.body());

    match state
        .credentials
        .register(payload.username(), payload.password())
        .await
    {
        Ok(_) => utils::deliver_serialized_json(
            &MessageResponse::success("Registro exitoso."),
            StatusCode::CREATED,
        ),
        Err(err) => {
            match &err {
                AuthError::Store(e) => error!("Registration store failure: {}", e),
                AuthError::Hashing(e) => error!("Registration hashing failure: {}", e),
                other => warn!("Registration rejected: {}", other.to_code()),
            }
            utils::deliver_auth_error(&err)
        }
    }
}
