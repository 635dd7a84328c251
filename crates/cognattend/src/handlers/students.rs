//! Student roster handlers, including registration with a face photo.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine as _;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::server::AppState;
use cognatten_store::Student;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default)]
    pub faculty: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    /// Face photo as base64, with or without a `data:` URL prefix.
    #[serde(default)]
    pub photo: Option<String>,
    /// Take the photo with the daemon's camera instead.
    #[serde(default)]
    pub capture: bool,
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub name: String,
    #[serde(default)]
    pub faculty: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Student>>> {
    Ok(Json(state.store.list_students().await?))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Student>> {
    match state.store.get_student(&id).await? {
        Some(student) => Ok(Json(student)),
        None => Err(AppError::not_found(format!("student not found: {id}"))),
    }
}

/// Register a student: generate an id, store the roster row, save the
/// face photo, and refresh the gallery.
///
/// A face photo is mandatory on this surface (the student cannot be
/// recognized without one), and the roster insert is rolled back when
/// the photo cannot be written, so a student never exists without their
/// reference photo.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Student>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("student name must not be empty"));
    }

    let jpeg = match (&req.photo, req.capture) {
        (Some(encoded), _) => decode_photo(encoded)?,
        (None, true) => state.engine.capture_photo(state.frames_per_scan).await?,
        (None, false) => {
            return Err(AppError::bad_request(
                "no face photo provided; send `photo` or set `capture`",
            ));
        }
    };

    let student = Student {
        id: state.store.next_student_id().await?,
        name: req.name,
        faculty: req.faculty,
        dob: req.dob,
        email: req.email,
        address: req.address,
    };
    state.store.upsert_student(&student).await?;

    if let Err(err) = state.photos.save(&student.id, &jpeg) {
        let _ = state.store.delete_student(&student.id).await;
        return Err(AppError::internal(format!("photo save failed: {err}")));
    }
    refresh_gallery(&state).await;

    tracing::info!(student_id = %student.id, name = %student.name, "student registered");
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> AppResult<Json<Student>> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("student name must not be empty"));
    }
    let student = Student {
        id,
        name: req.name,
        faculty: req.faculty,
        dob: req.dob,
        email: req.email,
        address: req.address,
    };
    state.store.update_student(&student).await?;
    Ok(Json(student))
}

/// Delete a student, their attendance rows (cascade), and their photo.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.store.delete_student(&id).await? {
        return Err(AppError::not_found(format!("student not found: {id}")));
    }
    if state.photos.remove(&id)? {
        refresh_gallery(&state).await;
    }
    tracing::info!(student_id = %id, "student removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    match state.photos.load(&id)? {
        Some(jpeg) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response()),
        None => Err(AppError::not_found(format!("no photo for student: {id}"))),
    }
}

/// Decode a base64 photo, tolerating a `data:image/...;base64,` prefix.
fn decode_photo(encoded: &str) -> Result<Vec<u8>, AppError> {
    let payload = match encoded.split_once(";base64,") {
        Some((_, payload)) => payload,
        None => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| AppError::bad_request(format!("invalid photo encoding: {err}")))
}

/// Gallery refresh after a photo change is best-effort: the roster write
/// already succeeded, so an engine outage only delays enrollment until
/// the next rebuild.
async fn refresh_gallery(state: &AppState) {
    if let Err(err) = state.rebuild_gallery().await {
        tracing::warn!(error = %err, "gallery refresh failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_photo_plain_base64() {
        let decoded = decode_photo("aGVsbG8=").unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn test_decode_photo_data_url() {
        let decoded = decode_photo("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn test_decode_photo_rejects_garbage() {
        assert!(decode_photo("not//valid!!base64").is_err());
    }
}
