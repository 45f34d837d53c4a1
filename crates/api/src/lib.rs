//! `api` crate — HTTP REST API layer
//!
//! Exposes:
//!   POST   /api/v1/tasks
//!   GET    /api/v1/tasks
//!   GET    /api/v1/tasks/:id
//!   PUT    /api/v1/tasks/:id
//!   DELETE /api/v1/tasks/:id
//!   GET    /api/v1/tasks/:id/results
//!   POST   /api/v1/tasks/:id/execute
//!   GET    /api/v1/results
//!   GET    /api/v1/metrics
//!   GET    /health

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use engine::{Metrics, TaskService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: TaskService,
    pub metrics: Arc<Metrics>,
}

pub async fn serve(bind: &str, state: AppState) -> Result<(), std::io::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/tasks", get(handlers::tasks::list).post(handlers::tasks::create))
        .route(
            "/tasks/:id",
            get(handlers::tasks::get)
                .put(handlers::tasks::update)
                .delete(handlers::tasks::cancel),
        )
        .route("/tasks/:id/results", get(handlers::tasks::results))
        .route("/tasks/:id/execute", post(handlers::tasks::execute))
        .route("/results", get(handlers::results::list))
        .route("/metrics", get(handlers::metrics::get));

    Router::new()
        .nest("/api/v1", api_router)
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
