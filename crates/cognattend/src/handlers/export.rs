//! CSV download endpoints.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::{AppError, AppResult};
use crate::server::AppState;
use cognatten_store::export;

pub async fn students_csv(State(state): State<AppState>) -> AppResult<Response> {
    let students = state.store.list_students().await?;
    let mut buf = Vec::new();
    export::write_students_csv(&mut buf, &students)
        .map_err(|err| AppError::internal(err.to_string()))?;
    Ok(csv_response("students.csv", buf))
}

pub async fn attendance_csv(State(state): State<AppState>) -> AppResult<Response> {
    let records = state.store.list_attendance().await?;
    let mut buf = Vec::new();
    export::write_attendance_csv(&mut buf, &records)
        .map_err(|err| AppError::internal(err.to_string()))?;
    Ok(csv_response("attendance.csv", buf))
}

fn csv_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
