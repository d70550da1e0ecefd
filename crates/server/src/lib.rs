//! Realtime room server for pair-programming classrooms.
//!
//! Participants connect to `/ws`, join a room and exchange collaboration,
//! cursor and annotation events. The HTTP API exposes room summaries and code
//! execution.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;

use config::Config;
use services::rooms::RoomRegistry;
use services::runner::{CodeRunner, ProcessRunner};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub rooms: RoomRegistry,
    pub runner: Arc<dyn CodeRunner>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let runner = Arc::new(ProcessRunner::from_config(&config));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: Config, runner: Arc<dyn CodeRunner>) -> Self {
        let rooms = RoomRegistry::new(config.max_students_per_room, config.channel_capacity);
        Self {
            config,
            rooms,
            runner,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let api_router = Router::new()
        .nest("/rooms", routes::rooms::router())
        .nest("/run", routes::run::router());

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}
