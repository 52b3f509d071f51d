use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    common::state::AppState,
    errors::Result,
    models::submission::{Submission, SubmissionStatus, TestDetail},
};

use super::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    pub problem_id: i64,
    pub language_id: i64,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,
    pub language_id: i64,
    pub code: String,
    pub status: SubmissionStatus,
    pub passed: bool,
    pub passed_count: i32,
    pub total_count: i32,
    pub results: Vec<TestDetail>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        Self {
            id: submission.id,
            user_id: submission.user_id,
            problem_id: submission.problem_id,
            language_id: submission.language_id,
            code: submission.code,
            status: submission.status,
            passed: submission.passed,
            passed_count: submission.passed_count,
            total_count: submission.total_count,
            results: submission.results.0,
            created_at: submission.created_at,
        }
    }
}

pub async fn create_submission(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<CreateSubmissionRequest>,
) -> Result<impl IntoResponse> {
    let (submission, _test_cases) = state
        .submission_service
        .create_submission(
            user_id,
            request.problem_id,
            request.language_id,
            request.code,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse::from(submission)),
    ))
}

pub async fn get_submission(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(submission_id): Path<i64>,
) -> Result<Json<SubmissionResponse>> {
    let submission = state
        .submission_service
        .get_submission(submission_id, user_id)
        .await?;

    Ok(Json(submission.into()))
}

pub async fn list_submissions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListSubmissionsQuery>,
) -> Result<Json<Vec<SubmissionResponse>>> {
    let submissions = state
        .submission_service
        .list_submissions(user_id, query.limit, query.offset)
        .await?;

    Ok(Json(
        submissions.into_iter().map(SubmissionResponse::from).collect(),
    ))
}
