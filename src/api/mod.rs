use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    MeetingError, VERSION,
    places::{AutocompleteProvider, Suggestion},
    planner::{MeetingPlan, MeetingPlanner, SearchRequest},
};

#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<MeetingPlanner>,
    pub suggester: Arc<dyn AutocompleteProvider>,
}

#[derive(Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub stage: String,
}

pub struct ApiFailure(MeetingError);

impl From<MeetingError> for ApiFailure {
    fn from(err: MeetingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MeetingError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            MeetingError::Geocoding { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MeetingError::Provider(_) => StatusCode::BAD_GATEWAY,
            MeetingError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Meeting search failed: {}", self.0);
        } else {
            tracing::info!("Meeting search rejected: {}", self.0);
        }

        let body = ApiError {
            error: self.0.user_message(),
            stage: self.0.stage().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub input: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/meeting-places", post(find_meeting_places))
        .route("/suggestions", get(suggestions))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}

async fn find_meeting_places(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<MeetingPlan>, ApiFailure> {
    let plan = state.planner.plan(&request).await?;
    Ok(Json(plan))
}

async fn suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> Json<Vec<Suggestion>> {
    Json(state.suggester.suggest(&query.input).await)
}
