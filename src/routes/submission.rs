use axum::{
    Router,
    routing::{get, post},
};

use crate::{common::state::AppState, handlers::submission};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/submissions",
            post(submission::create_submission).get(submission::list_submissions),
        )
        .route("/submissions/{submission_id}", get(submission::get_submission))
}
