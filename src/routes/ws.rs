use axum::{Router, routing::get};

use crate::{common::state::AppState, handlers::ws};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/submissions/{submission_id}", get(ws::submission_ws))
}
