//! Attendance handlers, including the camera scan endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::server::AppState;
use cognatten_store::AttendanceRecord;

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// A new attendance row was inserted.
    Marked,
    /// Recognized, but already marked within the last 12 hours.
    Duplicate,
    /// A face was found but matched nobody in the gallery.
    Unknown,
    /// No face visible in any captured frame.
    NoFace,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl ScanResponse {
    fn status_only(status: ScanStatus) -> Self {
        Self {
            status,
            student_id: None,
            name: None,
            date: None,
            time: None,
            distance: None,
        }
    }
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<AttendanceRecord>>> {
    Ok(Json(state.store.list_attendance().await?))
}

pub async fn for_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<AttendanceRecord>>> {
    if state.store.get_student(&id).await?.is_none() {
        return Err(AppError::not_found(format!("student not found: {id}")));
    }
    Ok(Json(state.store.attendance_for_student(&id).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if !state.store.delete_attendance(id).await? {
        return Err(AppError::not_found(format!(
            "attendance record not found: {id}"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// One camera pass: identify the person in front of the camera and mark
/// attendance under the 12-hour rule.
pub async fn scan(State(state): State<AppState>) -> AppResult<Json<ScanResponse>> {
    let gallery = state.gallery.read().await.clone();
    if gallery.is_empty() {
        return Err(AppError::bad_request(
            "no enrolled faces; register a student with a photo first",
        ));
    }

    let ident = state
        .engine
        .identify(gallery, state.match_tolerance, state.frames_per_scan)
        .await?;

    let Some(ident) = ident else {
        return Ok(Json(ScanResponse::status_only(ScanStatus::NoFace)));
    };

    let Some(student_id) = ident.result.student_id else {
        tracing::info!(distance = ident.result.distance, "unrecognized face");
        return Ok(Json(ScanResponse {
            distance: Some(ident.result.distance),
            ..ScanResponse::status_only(ScanStatus::Unknown)
        }));
    };

    let now = chrono::Local::now().naive_local();
    match state.store.mark_attendance(&student_id, now).await? {
        Some(mark) => {
            tracing::info!(
                student_id = %mark.student_id,
                name = %mark.name,
                distance = ident.result.distance,
                "attendance marked"
            );
            Ok(Json(ScanResponse {
                status: ScanStatus::Marked,
                student_id: Some(mark.student_id),
                name: Some(mark.name),
                date: Some(mark.date),
                time: Some(mark.time),
                distance: Some(ident.result.distance),
            }))
        }
        None => {
            let name = state
                .store
                .get_student(&student_id)
                .await?
                .map(|s| s.name);
            tracing::info!(student_id = %student_id, "already marked within window");
            Ok(Json(ScanResponse {
                status: ScanStatus::Duplicate,
                student_id: Some(student_id),
                name,
                date: None,
                time: None,
                distance: Some(ident.result.distance),
            }))
        }
    }
}
