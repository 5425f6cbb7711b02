//! Tally Server
//!
//! Exposes the matching and reconciliation operations over HTTP:
//! - MCP tools at `/mcp` (Streamable HTTP transport) for agents
//! - JSON endpoints under `/api` mirroring the two tools
//!
//! There is no authentication layer; bind to localhost unless the network is
//! trusted.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use tally_core::{LedgerBackend, LedgerClient, TallyConfig};

mod handlers;
pub mod mcp;

pub use mcp::TallyMcpServer;

/// Shared application state
pub struct AppState {
    pub ledger: LedgerClient,
    pub config: TallyConfig,
}

/// Build the HTTP router (JSON API only, no MCP)
pub fn create_router(ledger: LedgerClient, config: TallyConfig) -> Router {
    let state = Arc::new(AppState { ledger, config });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/match", post(handlers::match_transactions))
        .route("/reconcile", post(handlers::reconcile));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the server: JSON API and MCP tools on one listener
pub async fn serve(
    ledger: LedgerClient,
    config: TallyConfig,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let app = create_router(ledger.clone(), config.clone())
        .nest_service("/mcp", mcp::mcp_service(ledger.clone(), config));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(ledger = %ledger.host(), "Starting server at http://{}", addr);
    info!("MCP endpoint at http://{}/mcp", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<tally_core::Error> for AppError {
    fn from(err: tally_core::Error) -> Self {
        if err.is_invalid_input() {
            return Self::bad_request(&err.to_string());
        }

        match err {
            tally_core::Error::NotFound(what) => Self::not_found(&format!("Not found: {}", what)),
            tally_core::Error::Api { status, detail } => Self {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Ledger service error ({}): {}", status, detail),
                internal: None,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                internal: Some(other.into()),
            },
        }
    }
}
