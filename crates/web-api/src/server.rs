use crate::{handlers, websocket};
use axum::{
    routing::{delete, get, post},
    Router,
};
use risk_agent_orchestrator::AgentHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Control surface over a running agent. Unauthenticated; bind it to a trusted interface.
pub struct ApiServer {
    agent: AgentHandle,
}

impl ApiServer {
    #[must_use]
    pub const fn new(agent: AgentHandle) -> Self {
        Self { agent }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/status", get(handlers::get_status))
            .route("/api/agent/start", post(handlers::start_agent))
            .route("/api/agent/stop", post(handlers::stop_agent))
            .route("/api/agent/tick", post(handlers::run_tick))
            .route("/api/watchlist", get(handlers::list_watchlist))
            .route("/api/watchlist", post(handlers::add_to_watchlist))
            .route("/api/watchlist/:symbol", delete(handlers::remove_from_watchlist))
            .route("/api/trades", get(handlers::list_trades))
            .route("/api/memory", get(handlers::list_memory))
            .route("/ws", get(websocket::websocket_handler))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.agent.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
