use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Limited, LengthLimitError, combinators::BoxBody};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use shared::types::Session;

use crate::AppState;
use crate::handlers::utils::*;
use crate::handlers::{auth, pages, views};

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Two tiers:
//
//   RouteHandler      no auth. Receives (req, state).
//                     Use for: /login, /registro, /health, public pages.
//
//   ProtectedHandler  requires a live session. Receives (req, state, session).
//                     The router answers 401 without calling the handler
//                     when there is none.
//
// Bodies are already collected (and size-capped) by the time a handler runs.

type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>;

type RouteHandler = Box<dyn Fn(Request<Bytes>, AppState) -> HandlerFuture + Send + Sync>;

type ProtectedHandler =
    Box<dyn Fn(Request<Bytes>, AppState, Session) -> HandlerFuture + Send + Sync>;

enum RouteKind {
    Open(RouteHandler),
    Protected(ProtectedHandler),
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    fn open<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Bytes>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    /// GET with no authentication.
    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Bytes>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.open(Method::GET, path, handler)
    }

    /// POST with no authentication. Use only for login / registration.
    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Bytes>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.open(Method::POST, path, handler)
    }

    /// GET that requires an established session.
    pub fn get_protected<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Bytes>, AppState, Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Protected(Box::new(move |req, state, session| {
                Box::pin(handler(req, state, session))
            })),
        });
        self
    }

    // ── Entry point ───────────────────────────────────────────────────────────

    /// Serve one request. Never fails: handler errors become a 500 JSON
    /// envelope and oversized bodies a 413.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        state: AppState,
    ) -> Response<BoxBody<Bytes, Infallible>>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("{} {}", method, path);

        let limit = state.config.server.max_body_bytes;
        let (parts, body) = req.into_parts();

        let result = match Limited::new(body, limit).collect().await {
            Ok(collected) => {
                let req = Request::from_parts(parts, collected.to_bytes());
                self.route(req, state).await
            }
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                warn!("Request body over {} bytes on {} {}", limit, method, path);
                deliver_error_json(
                    "PAYLOAD_TOO_LARGE",
                    "Cuerpo de la solicitud demasiado grande.",
                    StatusCode::PAYLOAD_TOO_LARGE,
                )
            }
            Err(e) => {
                warn!("Failed to read request body on {} {}: {}", method, path, e);
                deliver_error_json(
                    "BAD_REQUEST",
                    "No se pudo leer la solicitud.",
                    StatusCode::BAD_REQUEST,
                )
            }
        };

        match result {
            Ok(res) => {
                info!("{} {} -> {}", method, path, res.status().as_u16());
                res
            }
            Err(e) => {
                error!("Handler failed on {} {}: {:#}", method, path, e);
                internal_error()
            }
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<Bytes>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method != method || !Self::path_matches(&route.path, &path) {
                continue;
            }

            return match &route.kind {
                RouteKind::Open(h) => h(req, state).await,

                RouteKind::Protected(h) => {
                    let request_session = state
                        .sessions
                        .resume(req.headers())
                        .await
                        .context("Failed to resolve session")?;

                    match request_session.current() {
                        Some(session) => {
                            let session = session.clone();
                            h(req, state, session).await
                        }
                        None => {
                            warn!("Unauthenticated request rejected: {} {}", method, path);
                            unauthorized(&req)
                        }
                    }
                }
            };
        }

        deliver_error_json(
            "NOT_FOUND",
            "Recurso no encontrado.",
            StatusCode::NOT_FOUND,
        )
        .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);
        route_path == clean
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 401 for the protected tier: the "not logged in" page, or the JSON
/// envelope for clients that ask for JSON.
fn unauthorized(req: &Request<Bytes>) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if accepts_content_type(req, "application/json") {
        return deliver_error_json(
            "UNAUTHORIZED",
            "No has iniciado sesión.",
            StatusCode::UNAUTHORIZED,
        )
        .context("Failed to deliver 401 response");
    }
    pages::deliver_unauthorized_page().context("Failed to deliver 401 page")
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    health: &'static str,
}

fn internal_error() -> Response<BoxBody<Bytes, Infallible>> {
    deliver_error_json(
        "INTERNAL_ERROR",
        "Error interno del servidor.",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .unwrap_or_else(|_| {
        let mut res = Response::new(empty());
        *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        res
    })
}

// ---------------------------------------------------------------------------
// Application router
// ---------------------------------------------------------------------------

pub fn build_router() -> Router {
    Router::new()
        // ── Public ───────────────────────────────────────────────────────────
        .get("/", |req, state| async move {
            views::handle_root(req, state)
                .await
                .context("Root page failed")
        })
        .get("/health", |_req, _state| async move {
            deliver_serialized_json(
                &Health {
                    status: "success",
                    health: "ok",
                },
                StatusCode::OK,
            )
        })
        .post("/registro", |req, state| async move {
            auth::handle_register(req, state)
                .await
                .context("Registration failed")
        })
        .post("/login", |req, state| async move {
            auth::handle_login(req, state)
                .await
                .context("Login failed")
        })
        .get("/login_home", |req, state| async move {
            auth::handle_login_page(req, state)
                .await
                .context("Login page failed")
        })
        .post("/login_home", |req, state| async move {
            auth::handle_login_form(req, state)
                .await
                .context("Form login failed")
        })
        .get("/logout", |req, state| async move {
            auth::handle_logout(req, state)
                .await
                .context("Logout failed")
        })
        // ── Protected: session required ──────────────────────────────────────
        .get_protected("/tareas", |req, state, session| async move {
            views::handle_tareas(req, state, session)
                .await
                .context("Tasks page failed")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use http_body_util::Full;

    async fn body_string(res: Response<BoxBody<Bytes, Infallible>>) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    #[test]
    fn path_matching_ignores_query() {
        assert!(Router::path_matches("/tareas", "/tareas"));
        assert!(Router::path_matches("/tareas", "/tareas?x=1"));
        assert!(!Router::path_matches("/tareas", "/tareas/1"));
        assert!(!Router::path_matches("/", "/tareas"));
    }

    #[tokio::test]
    async fn unknown_route_is_404_json() {
        let router = build_router();
        let res = router
            .handle(request(Method::GET, "/nope", ""), test_state())
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(body_string(res).await.contains("NOT_FOUND"));
    }

    #[tokio::test]
    async fn wrong_method_is_404() {
        let router = build_router();
        let res = router
            .handle(request(Method::DELETE, "/tareas", ""), test_state())
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = build_router();
        let res = router
            .handle(request(Method::GET, "/health", ""), test_state())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_string(res).await,
            r#"{"status":"success","health":"ok"}"#
        );
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let router = build_router();
        let big = "x".repeat(64 * 1024);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/registro")
            .body(Full::new(Bytes::from(big)))
            .unwrap();
        let res = router.handle(req, test_state()).await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn handler_error_becomes_500_envelope() {
        let router = Router::new().get("/boom", |_req, _state| async move {
            Err::<Response<BoxBody<Bytes, Infallible>>, _>(anyhow::anyhow!("kaboom"))
        });
        let res = router
            .handle(request(Method::GET, "/boom", ""), test_state())
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(res).await;
        assert!(body.contains("INTERNAL_ERROR"));
        assert!(!body.contains("kaboom"));
    }

    #[tokio::test]
    async fn protected_handler_is_not_run_without_session() {
        let router = Router::new().get_protected("/secret", |_req, _state, _session| async move {
            deliver_html("secret", StatusCode::OK)
        });

        let res = router
            .handle(request(Method::GET, "/secret", ""), test_state())
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(res).await.contains("No has iniciado sesión"));

        let json = Request::builder()
            .uri("/secret")
            .header("accept", "application/json")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let res = router.handle(json, test_state()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(res).await.contains("UNAUTHORIZED"));
    }
}
