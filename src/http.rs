use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::{
    coordinator::AssignError,
    desk::{Desk, Intent, IntentError},
    view::Snapshot,
};

type SharedDesk = Arc<Desk>;

pub fn router(desk: SharedDesk) -> Router {
    Router::new()
        .route("/view", get(get_view))
        .route("/intent", post(post_intent))
        .with_state(desk)
}

async fn get_view(State(desk): State<SharedDesk>) -> Json<Snapshot> {
    Json(desk.view().snapshot())
}

async fn post_intent(
    State(desk): State<SharedDesk>,
    Json(intent): Json<Intent>,
) -> Result<Json<Snapshot>, IntentError> {
    desk.handle(intent).await?;
    Ok(Json(desk.view().snapshot()))
}

impl IntoResponse for IntentError {
    fn into_response(self) -> Response {
        tracing::warn!("intent failed: {self}");
        match self {
            Self::Selection(_) => StatusCode::CONFLICT,
            Self::Assign(AssignError::RealtimeStoreUnavailable(_))
            | Self::Assign(AssignError::PartialAssignmentFailure(_))
            | Self::Refresh(_) => StatusCode::BAD_GATEWAY,
        }
        .into_response()
    }
}
