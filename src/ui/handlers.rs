//! REST handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::audio::device::{list_input_devices, InputDeviceInfo};
use crate::error::MonitorError;
use crate::monitor::MonitorSnapshot;
use crate::protocol::PermissionRequest;
use crate::ui::server::AppState;

/// Error body returned by the REST API
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        let status = match err {
            MonitorError::Permission => StatusCode::FORBIDDEN,
            MonitorError::Device(_) => StatusCode::SERVICE_UNAVAILABLE,
            MonitorError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// GET /api/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<MonitorSnapshot> {
    Json(state.monitor.snapshot())
}

/// GET /api/devices
pub async fn get_devices() -> Result<Json<Vec<InputDeviceInfo>>, ApiError> {
    let devices = tokio::task::spawn_blocking(list_input_devices).await?;
    Ok(Json(devices))
}

/// POST /api/start
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<MonitorSnapshot>, ApiError> {
    let monitor = state.monitor.clone();
    // Opening a device and joining threads block
    tokio::task::spawn_blocking(move || monitor.start()).await??;
    Ok(Json(state.monitor.snapshot()))
}

/// POST /api/stop
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<MonitorSnapshot>, ApiError> {
    let monitor = state.monitor.clone();
    tokio::task::spawn_blocking(move || monitor.stop()).await?;
    Ok(Json(state.monitor.snapshot()))
}

/// POST /api/permission
pub async fn set_permission(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PermissionRequest>,
) -> Result<Json<MonitorSnapshot>, ApiError> {
    let monitor = state.monitor.clone();
    tokio::task::spawn_blocking(move || monitor.check_permission(request.granted)).await?;
    Ok(Json(state.monitor.snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synthetic::SyntheticSource;
    use crate::config::UiConfig;
    use crate::monitor::{MonitorSettings, SoundLevelMonitor};
    use crate::ui::server::WebServer;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router(granted: bool) -> (axum::Router, Arc<SoundLevelMonitor>) {
        let monitor = Arc::new(SoundLevelMonitor::new(
            Arc::new(SyntheticSource::with_seed(1)),
            MonitorSettings::default(),
        ));
        monitor.check_permission(granted);
        let server = WebServer::new(UiConfig::default(), monitor.clone());
        (server.build_router(), monitor)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, body: Body) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_status() {
        let (app, _monitor) = router(true);
        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["source"], "synthetic");
    }

    #[tokio::test]
    async fn test_start_without_permission_is_forbidden() {
        let (app, monitor) = router(false);
        let response = app.oneshot(post("/api/start", Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let (app, monitor) = router(true);

        let response = app.clone().oneshot(post("/api/start", Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["running"], true);

        let response = app.oneshot(post("/api/stop", Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["running"], false);
        assert_eq!(json["reading"]["decibel_level"], 0.0);
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_revoke_permission() {
        let (app, monitor) = router(true);
        monitor.start().unwrap();

        let body = Body::from(r#"{"granted":false}"#);
        let response = app.oneshot(post("/api/permission", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["permission_granted"], false);
        assert_eq!(json["running"], false);
    }
}
