use crate::bus::WatchLimiter;
use crate::entity::Entity;
use crate::error::WorldError;
use crate::filter::EntityFilter;
use crate::geo::Geometry;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

/// Batch upsert request. Either every change is applied or an error is
/// returned before any side effect.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushRequest {
    pub changes: Vec<Entity>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushResponse {
    pub accepted: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<EntityFilter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub entities: Vec<Entity>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetResponse {
    pub entity: Entity,
}

/// First client frame on a watch stream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WatchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<EntityFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limiter: Option<WatchLimiter>,
}

/// One frame on the observe stream: the union of currently observed
/// regions as a WKB geometry collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObserverState {
    pub geo: Geometry,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Adapter mapping core errors onto HTTP responses.
pub struct ApiError(pub WorldError);

impl From<WorldError> for ApiError {
    fn from(e: WorldError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WorldError::NotFound(_) => StatusCode::NOT_FOUND,
            WorldError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            WorldError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            WorldError::Cancelled | WorldError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}
