// HTTP and WebSocket surface. The wire format here is JSON over axum; the
// core types serialize with their stable numeric tags and change kinds.

pub mod observe;
pub mod protocol;
pub mod watch;
pub mod world;

pub use protocol::{ListRequest, ListResponse, PushRequest, PushResponse, WatchRequest};

use crate::world::WorldServer;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Shared application state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub world: Arc<WorldServer>,
}

/// Build the complete router: entity CRUD, watch and observe streams, and
/// the health probe.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/entities", post(world::push))
        .route("/api/entities/list", post(world::list))
        .route("/api/entities/:id", get(world::get_entity))
        .route("/api/watch", get(watch::watch_handler))
        .route("/api/observe", get(observe::observe_handler))
        .route("/healthz", get(healthz))
        .with_state(Arc::new(state))
}

async fn healthz() -> &'static str {
    "OK"
}
