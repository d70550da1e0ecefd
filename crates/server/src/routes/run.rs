use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    services::runner::simplify_error,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(run_code))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub code: String,
    #[serde(default)]
    pub stdin: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub stdout: String,
    pub stderr: String,
    /// Simplified error message, when the program wrote to stderr.
    pub error: Option<String>,
}

async fn run_code(
    State(state): State<AppState>,
    Json(body): Json<RunRequest>,
) -> Result<Json<RunResponse>> {
    if body.code.trim().is_empty() {
        return Err(AppError::Validation("Code must not be empty".to_string()));
    }

    let output = state.runner.run(&body.code, &body.stdin).await?;
    tracing::debug!(exit_code = ?output.exit_code, "code run finished");

    Ok(Json(RunResponse {
        error: simplify_error(&output.stderr),
        stdout: output.stdout,
        stderr: output.stderr,
    }))
}
