//! Operator control routes

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::Command;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub accepted: bool,
    pub message: String,
}

/// Queue a counter reset on the processing thread
pub async fn post_reset(State(state): State<Arc<AppState>>) -> (StatusCode, Json<CommandResponse>) {
    match state.commands.send(Command::Reset) {
        Ok(()) => {
            info!("Reset requested over HTTP");
            (
                StatusCode::ACCEPTED,
                Json(CommandResponse {
                    accepted: true,
                    message: "reset queued".to_string(),
                }),
            )
        }
        Err(_) => {
            warn!("Reset rejected: pipeline stopped");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(CommandResponse {
                    accepted: false,
                    message: "pipeline is not running".to_string(),
                }),
            )
        }
    }
}
