//! Status Routes

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::session::StatusSnapshot;
use crate::AppState;

/// Latest detector snapshot
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.status.borrow().clone())
}
