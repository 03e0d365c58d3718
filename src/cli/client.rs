use crate::api::protocol::{
    GetResponse, ListRequest, ListResponse, PushRequest, PushResponse, WatchRequest,
};
use crate::entity::Entity;
use crate::filter::EntityFilter;
use anyhow::{bail, Context, Result};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Thin HTTP/WS client for the world server.
pub struct Client {
    base: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(server: &str) -> Self {
        Self {
            base: server.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn push(&self, changes: Vec<Entity>) -> Result<bool> {
        let response = self
            .http
            .post(format!("{}/api/entities", self.base))
            .json(&PushRequest { changes })
            .send()
            .await
            .context("push request failed")?;

        let response: PushResponse = check(response).await?.json().await?;
        Ok(response.accepted)
    }

    pub async fn list(&self, filter: Option<EntityFilter>) -> Result<Vec<Entity>> {
        let response = self
            .http
            .post(format!("{}/api/entities/list", self.base))
            .json(&ListRequest { filter })
            .send()
            .await
            .context("list request failed")?;

        let response: ListResponse = check(response).await?.json().await?;
        Ok(response.entities)
    }

    pub async fn get(&self, id: &str) -> Result<Entity> {
        let response = self
            .http
            .get(format!("{}/api/entities/{}", self.base, id))
            .send()
            .await
            .context("get request failed")?;

        let response: GetResponse = check(response).await?.json().await?;
        Ok(response.entity)
    }

    /// Open a watch stream and send the opening request frame.
    pub async fn watch(&self, request: &WatchRequest) -> Result<WsStream> {
        let (mut socket, _) = connect_async(self.ws_url("/api/watch"))
            .await
            .context("failed to open watch stream")?;

        let frame = serde_json::to_string(request)?;
        socket.send(Message::Text(frame.into())).await?;
        Ok(socket)
    }

    pub async fn observe(&self) -> Result<WsStream> {
        let (socket, _) = connect_async(self.ws_url("/api/observe"))
            .await
            .context("failed to open observe stream")?;
        Ok(socket)
    }

    fn ws_url(&self, path: &str) -> String {
        let base = if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{}", self.base)
        };
        format!("{base}{path}")
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    bail!("server returned {status}: {message}")
}
