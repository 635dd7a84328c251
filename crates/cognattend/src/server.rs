//! Shared application state and the HTTP router.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::EngineHandle;
use crate::handlers;
use cognatten_core::GalleryEntry;
use cognatten_store::{PhotoStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub photos: PhotoStore,
    pub engine: EngineHandle,
    /// Enrolled embeddings, rebuilt whenever the photo directory changes.
    pub gallery: Arc<RwLock<Vec<GalleryEntry>>>,
    pub match_tolerance: f32,
    pub frames_per_scan: usize,
}

impl AppState {
    /// Re-encode every photo in the photo directory into a fresh gallery.
    ///
    /// Per-student encoding failures are logged and skipped; the gallery
    /// keeps whatever loaded. Only an engine outage is an error.
    pub async fn rebuild_gallery(&self) -> Result<usize, crate::engine::EngineError> {
        let photos = match self.photos.list() {
            Ok(photos) => photos,
            Err(err) => {
                tracing::error!(error = %err, "photo directory unreadable; keeping current gallery");
                return Ok(self.gallery.read().await.len());
            }
        };

        let (entries, issues) = self.engine.load_gallery(photos).await?;
        for issue in &issues {
            tracing::warn!(student_id = issue.student_id(), error = %issue, "photo not enrolled");
        }
        tracing::info!(
            enrolled = entries.len(),
            skipped = issues.len(),
            "gallery rebuilt"
        );

        let count = entries.len();
        *self.gallery.write().await = entries;
        Ok(count)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/login", post(handlers::auth::login))
        .route(
            "/api/students",
            get(handlers::students::list).post(handlers::students::register),
        )
        .route(
            "/api/students/{id}",
            get(handlers::students::show)
                .put(handlers::students::update)
                .delete(handlers::students::remove),
        )
        .route("/api/students/{id}/photo", get(handlers::students::photo))
        .route(
            "/api/students/{id}/attendance",
            get(handlers::attendance::for_student),
        )
        .route("/api/attendance", get(handlers::attendance::list))
        .route(
            "/api/attendance/{id}",
            axum::routing::delete(handlers::attendance::remove),
        )
        .route("/api/attendance/scan", post(handlers::attendance::scan))
        .route(
            "/api/export/students.csv",
            get(handlers::export::students_csv),
        )
        .route(
            "/api/export/attendance.csv",
            get(handlers::export::attendance_csv),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use base64::Engine as _;
    use cognatten_core::Embedding;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            store: Store::open_in_memory().await.unwrap(),
            photos: PhotoStore::open(dir.path().join("faces")).unwrap(),
            engine: EngineHandle::disconnected(),
            gallery: Arc::new(RwLock::new(Vec::new())),
            match_tolerance: 0.6,
            frames_per_scan: 3,
        };
        (state, dir)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_login() {
        let (state, _dir) = test_state().await;
        let app = router(state);

        let ok = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/login",
                json!({"id": "admin1", "password": "admin1"}),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let rejected = app
            .oneshot(json_request(
                "POST",
                "/api/login",
                json!({"id": "admin1", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_student_lifecycle() {
        let (state, _dir) = test_state().await;
        let app = router(state);

        let encoded = base64::engine::general_purpose::STANDARD.encode(b"jpegbytes");
        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/students",
                json!({"name": "Mika", "faculty": "Science", "photo": encoded}),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let student = body_json(created).await;
        let id = student["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("817"));
        assert_eq!(id.len(), 8);

        let listed = app.clone().oneshot(get("/api/students")).await.unwrap();
        let listed = body_json(listed).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let updated = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/students/{id}"),
                json!({"name": "Mika R", "faculty": "Arts"}),
            ))
            .await
            .unwrap();
        assert_eq!(updated.status(), StatusCode::OK);

        let shown = app
            .clone()
            .oneshot(get(&format!("/api/students/{id}")))
            .await
            .unwrap();
        let shown = body_json(shown).await;
        assert_eq!(shown["name"], "Mika R");

        let removed = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/students/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(removed.status(), StatusCode::NO_CONTENT);

        let gone = app
            .oneshot(get(&format!("/api/students/{id}")))
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_with_photo_and_serve_it() {
        let (state, _dir) = test_state().await;
        let photos = state.photos.clone();
        let app = router(state);

        let encoded = base64::engine::general_purpose::STANDARD.encode(b"jpegbytes");
        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/students",
                json!({
                    "name": "Abel",
                    "photo": format!("data:image/jpeg;base64,{encoded}"),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = body_json(created).await["id"].as_str().unwrap().to_string();
        assert!(photos.exists(&id));

        let served = app
            .oneshot(get(&format!("/api/students/{id}/photo")))
            .await
            .unwrap();
        assert_eq!(served.status(), StatusCode::OK);
        assert_eq!(
            served.headers()[header::CONTENT_TYPE],
            "image/jpeg"
        );
        let bytes = to_bytes(served.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"jpegbytes");
    }

    #[tokio::test]
    async fn test_register_rejects_empty_name() {
        let (state, _dir) = test_state().await;
        let response = router(state)
            .oneshot(json_request("POST", "/api/students", json!({"name": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_requires_photo() {
        let (state, _dir) = test_state().await;
        let store = state.store.clone();
        let app = router(state);

        // Neither an uploaded photo nor a camera capture: no roster row
        // may be created.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/students",
                json!({"name": "Mika", "faculty": "Science"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.list_students().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_empty_name() {
        let (state, _dir) = test_state().await;
        let store = state.store.clone();
        let app = router(state);

        store
            .upsert_student(&cognatten_store::Student {
                id: "81710001".into(),
                name: "Mika".into(),
                faculty: String::new(),
                dob: String::new(),
                email: String::new(),
                address: String::new(),
            })
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/students/81710001",
                json!({"name": "  "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let current = store.get_student("81710001").await.unwrap().unwrap();
        assert_eq!(current.name, "Mika");
    }

    #[tokio::test]
    async fn test_attendance_list_and_delete() {
        let (state, _dir) = test_state().await;
        let store = state.store.clone();
        let app = router(state);

        store
            .upsert_student(&cognatten_store::Student {
                id: "81710001".into(),
                name: "Mika".into(),
                faculty: String::new(),
                dob: String::new(),
                email: String::new(),
                address: String::new(),
            })
            .await
            .unwrap();
        store
            .insert_attendance("81710001", "2026-02-01", "10:00:00")
            .await
            .unwrap();

        let listed = app.clone().oneshot(get("/api/attendance")).await.unwrap();
        let listed = body_json(listed).await;
        let rows = listed.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Mika");
        let row_id = rows[0]["id"].as_i64().unwrap();

        let removed = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/attendance/{row_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(removed.status(), StatusCode::NO_CONTENT);

        let again = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/attendance/{row_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_requires_gallery() {
        let (state, _dir) = test_state().await;
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/attendance/scan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_without_engine_is_unavailable() {
        let (state, _dir) = test_state().await;
        state.gallery.write().await.push(cognatten_core::GalleryEntry {
            student_id: "81710001".into(),
            embedding: Embedding {
                values: vec![0.0; 128],
                model_version: Some("mobilefacenet".into()),
            },
        });

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/attendance/scan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_students_csv_export() {
        let (state, _dir) = test_state().await;
        let store = state.store.clone();
        let app = router(state);

        store
            .upsert_student(&cognatten_store::Student {
                id: "81710001".into(),
                name: "Mika".into(),
                faculty: "Science".into(),
                dob: "2002-09-09".into(),
                email: "mika@example.edu".into(),
                address: "1 Main St".into(),
            })
            .await
            .unwrap();

        let response = app.oneshot(get("/api/export/students.csv")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("ID,Name,Faculty,DOB,Email,Address\n"));
        assert!(text.contains("81710001,Mika"));
    }
}
