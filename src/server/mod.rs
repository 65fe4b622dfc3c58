//! JSON API over HTTP for dashboards and other read-mostly clients.
//!
//! Every request names its acting user in the `x-pmo-user` header and is
//! checked against the same access policy as the CLI.

mod handlers;

use axum::{
    Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::commands::{Context, Output};
use crate::storage::Storage;
use crate::{Error, Result};

/// Header carrying the acting user's ID.
pub const ACTOR_HEADER: &str = "x-pmo-user";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Mutex<Storage>>,
}

/// Build the API router around `storage`.
pub fn router(storage: Storage) -> Router {
    let state = AppState {
        storage: Arc::new(Mutex::new(storage)),
    };

    Router::new()
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/portfolios", get(handlers::list_portfolios))
        .route("/api/portfolios/:id", get(handlers::show_portfolio))
        .route("/api/portfolios/:id/stats", get(handlers::portfolio_stats))
        .route(
            "/api/portfolios/:id/recompute-health",
            post(handlers::recompute_health),
        )
        .route("/api/projects", get(handlers::list_projects))
        .route("/api/projects/:id", get(handlers::show_project))
        .route("/api/risks", get(handlers::list_risks))
        .route("/api/risks/summary", get(handlers::risk_summary))
        .route("/api/risks/:id", get(handlers::show_risk))
        .route("/api/standards", get(handlers::list_standards))
        .route("/api/standards/:id", get(handlers::show_standard))
        .route("/api/compliance", get(handlers::list_evaluations))
        .route("/api/compliance/summary", get(handlers::compliance_summary))
        .route("/api/compliance/:id", get(handlers::show_evaluation))
        .route("/api/access/matrix", get(handlers::access_matrix))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until the process is stopped.
pub async fn serve(storage: Storage, host: &str, port: u16) -> Result<()> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid host address: {}", host)))?;
    let addr = SocketAddr::new(ip, port);

    let app = router(storage);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving pmo API");
    eprintln!("pmo API listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Library errors mapped onto HTTP statuses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Error::InvalidId(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) | Error::ReferentialIntegrity(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() }).to_string();
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

type ApiResult = std::result::Result<Response, ApiError>;

fn json_response<T: Output>(value: &T) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        value.to_json(),
    )
        .into_response()
}

/// The acting user named by the request. Anonymous requests are refused.
fn actor_from(headers: &HeaderMap) -> Result<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::PermissionDenied(format!("missing {} header", ACTOR_HEADER))
        })
}

/// Run `f` as the request's acting user and render its output.
async fn with_context<T, F>(state: &AppState, headers: &HeaderMap, f: F) -> ApiResult
where
    T: Output,
    F: FnOnce(&mut Context) -> Result<T>,
{
    let actor = actor_from(headers)?;
    let mut storage = state.storage.lock().await;
    let mut ctx = Context::new(&mut storage, Some(&actor))?;
    let result = f(&mut ctx)?;
    Ok(json_response(&result))
}
