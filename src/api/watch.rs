use crate::api::protocol::WatchRequest;
use crate::api::AppState;
use crate::auth::Ability;
use crate::entity::ChangeEvent;
use crate::error::WorldError;
use crate::world::WorldServer;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// GET /api/watch - websocket upgrade for the entity change stream.
///
/// The client's first text frame is a `WatchRequest` carrying the optional
/// filter and limiter. The stream then opens with a benign `invalid`
/// sentinel, replays the current matching snapshot as `updated` events, and
/// follows with live events in priority order.
pub async fn watch_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let ability = match peer {
        Some(ConnectInfo(addr)) => Ability::for_peer(addr.to_string()),
        None => Ability::default(),
    };
    info!(peer = ?ability.peer(), "watch stream opening");
    ws.on_upgrade(move |socket| handle_watch(socket, state, ability))
}

async fn handle_watch(socket: WebSocket, state: Arc<AppState>, ability: Ability) {
    match run_watch(socket, Arc::clone(&state.world), ability).await {
        Ok(()) | Err(WorldError::Cancelled) => debug!("watch stream closed"),
        Err(e) => warn!(error = %e, "watch stream failed"),
    }
}

async fn run_watch(
    mut socket: WebSocket,
    world: Arc<WorldServer>,
    ability: Ability,
) -> Result<(), WorldError> {
    let request = read_watch_request(&mut socket).await?;

    let (sink, stream) = socket.split();
    let sink: WsSink = Arc::new(Mutex::new(sink));

    // Client-side close (or transport error) cancels the stream
    let cancel = CancellationToken::new();
    let reader = tokio::spawn(read_client_frames(
        stream,
        Arc::clone(&sink),
        cancel.clone(),
    ));

    let send_sink = Arc::clone(&sink);
    let result = world
        .watch_entities(
            Some(ability),
            request.filter,
            request.limiter,
            cancel.clone(),
            move |event| {
                let sink = Arc::clone(&send_sink);
                async move { send_event(&sink, &event).await }
            },
        )
        .await;

    cancel.cancel();
    reader.abort();
    result
}

/// Wait for the client's opening `WatchRequest` frame.
async fn read_watch_request(socket: &mut WebSocket) -> Result<WatchRequest, WorldError> {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                return serde_json::from_str(&text).map_err(|e| {
                    WorldError::InvalidArgument(format!("malformed watch request: {e}"))
                });
            }
            Ok(Message::Close(_)) => return Err(WorldError::Cancelled),
            Ok(_) => continue,
            Err(_) => return Err(WorldError::Cancelled),
        }
    }
    Err(WorldError::Cancelled)
}

async fn read_client_frames(
    mut stream: SplitStream<WebSocket>,
    sink: WsSink,
    cancel: CancellationToken,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(Message::Ping(data)) => {
                if sink.lock().await.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
        }
    }
    cancel.cancel();
}

async fn send_event(sink: &WsSink, event: &ChangeEvent) -> Result<(), WorldError> {
    let json = serde_json::to_string(event).map_err(WorldError::internal)?;
    sink.lock()
        .await
        .send(Message::Text(json))
        .await
        .map_err(|_| WorldError::Cancelled)
}
