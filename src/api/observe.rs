use crate::api::protocol::ObserverState;
use crate::api::AppState;
use crate::geo::{wkb, Geometry};
use crate::world::WorldServer;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// GET /api/observe - websocket stream of the observed-regions registry.
///
/// Peers receive one state frame on open and one per registry change, each
/// carrying the union of currently observed geometries as a WKB collection.
pub async fn observe_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("observe stream opening");
    ws.on_upgrade(move |socket| handle_observe(socket, state))
}

async fn handle_observe(mut socket: WebSocket, state: Arc<AppState>) {
    let world = Arc::clone(&state.world);
    let mut changes = world.bus().subscribe_observed();

    if send_state(&mut socket, &world).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = changes.recv() => {
                match result {
                    Ok(()) => {
                        if send_state(&mut socket, &world).await.is_err() {
                            debug!("observe client disconnected");
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped = skipped, "observe stream lagged, resending state");
                        if send_state(&mut socket, &world).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("observe client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return,
                }
            }
        }
    }
}

async fn send_state(socket: &mut WebSocket, world: &WorldServer) -> Result<(), ()> {
    let collection = world.observed().collection();
    let state = ObserverState {
        geo: Geometry {
            planar: None,
            wkb: Some(wkb::encode_collection(&collection)),
        },
    };

    let json = serde_json::to_string(&state).map_err(|_| ())?;
    socket.send(Message::Text(json)).await.map_err(|_| ())
}
