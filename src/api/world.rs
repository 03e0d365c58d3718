use crate::api::protocol::{
    ApiError, GetResponse, ListRequest, ListResponse, PushRequest, PushResponse,
};
use crate::api::AppState;
use crate::auth::Ability;
use axum::extract::{ConnectInfo, Path, State};
use axum::response::Json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

fn ability_for(peer: Option<ConnectInfo<SocketAddr>>) -> Ability {
    match peer {
        Some(ConnectInfo(addr)) => Ability::for_peer(addr.to_string()),
        None => Ability::default(),
    }
}

/// POST /api/entities - batch upsert
pub async fn push(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>, ApiError> {
    let ability = ability_for(peer);

    info!(count = request.changes.len(), "accepting entity changes");
    let accepted = state.world.push(&ability, request.changes)?;

    Ok(Json(PushResponse { accepted }))
}

/// POST /api/entities/list - filtered snapshot, sorted by id
pub async fn list(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<ListRequest>,
) -> Result<Json<ListResponse>, ApiError> {
    let ability = ability_for(peer);
    let entities = state.world.list(&ability, request.filter.as_ref());
    Ok(Json(ListResponse { entities }))
}

/// GET /api/entities/:id
pub async fn get_entity(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    Path(id): Path<String>,
) -> Result<Json<GetResponse>, ApiError> {
    let ability = ability_for(peer);
    let entity = state.world.get(&ability, &id)?;
    Ok(Json(GetResponse { entity }))
}
