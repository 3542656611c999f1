//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::AppState;
use super::types::{ErrorResponse, HealthResponse, RoomUpdate};
use crate::request::{ControlRequest, validate_room_id};
use crate::room::ledger::Bill;
use crate::room::types::RoomId;
use crate::runtime::DriverError;
use crate::sim::types::{Ack, RoomSnapshot, SystemStatus};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn unavailable(err: DriverError) -> ApiError {
    error(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}

fn room_id(raw: &str) -> Result<RoomId, ApiError> {
    validate_room_id(raw).map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))
}

fn found<T>(value: Option<T>, id: &RoomId) -> Result<Json<T>, ApiError> {
    value
        .map(Json)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("unknown room `{id}`")))
}

/// `POST /rooms/{id}/control` → 200 + `Ack`, 400 with the rejection reason.
pub async fn control(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ControlRequest>,
) -> Result<Json<Ack>, ApiError> {
    match state.driver.control(&id, request).await.map_err(unavailable)? {
        Ok(ack) => Ok(Json(ack)),
        Err(e) => Err(error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

/// `POST /rooms/{id}/power-off` → 200 + `Ack`, 404 for unknown rooms.
pub async fn power_off(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let id = room_id(&id)?;
    if state
        .driver
        .power_off(id.clone())
        .await
        .map_err(unavailable)?
    {
        Ok(Json(Ack::accepted(&id)))
    } else {
        Err(error(StatusCode::NOT_FOUND, format!("unknown room `{id}`")))
    }
}

/// `POST /rooms/{id}/request` → 200 + `Ack`, 404 for unknown rooms.
///
/// Re-queues the room under the parameters it already holds.
pub async fn request_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let id = room_id(&id)?;
    if state
        .driver
        .request_service(id.clone())
        .await
        .map_err(unavailable)?
    {
        Ok(Json(Ack::accepted(&id)))
    } else {
        Err(error(StatusCode::NOT_FOUND, format!("unknown room `{id}`")))
    }
}

/// `GET /rooms/{id}` → 200 + `RoomSnapshot`.
pub async fn room_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    let id = room_id(&id)?;
    let snapshot = state
        .driver
        .room_status(id.clone())
        .await
        .map_err(unavailable)?;
    found(snapshot, &id)
}

/// `GET /rooms/{id}/bill` → 200 + `Bill` of the current stay.
pub async fn bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Bill>, ApiError> {
    let id = room_id(&id)?;
    let bill = state.driver.bill(id.clone()).await.map_err(unavailable)?;
    found(bill, &id)
}

/// `POST /rooms/{id}/checkout` → 200 + final `Bill`; the room is discarded.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Bill>, ApiError> {
    let id = room_id(&id)?;
    let bill = state
        .driver
        .checkout(id.clone())
        .await
        .map_err(unavailable)?;
    found(bill, &id)
}

/// `GET /status` → 200 + `SystemStatus`.
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<SystemStatus>, ApiError> {
    state.driver.status().await.map(Json).map_err(unavailable)
}

/// `GET /health` → 200 while the driver is running.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let status = state.driver.status().await.map_err(unavailable)?;
    Ok(Json(HealthResponse {
        status: "ok",
        tick: status.tick,
    }))
}

/// `GET /ws` → WebSocket pushing one `SystemStatus` JSON text frame per tick.
pub async fn ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let updates = state.driver.subscribe();
    ws.on_upgrade(move |socket| push_frames(socket, updates, |status| status.to_json().map(Some)))
}

/// `GET /rooms/{id}/ws` → WebSocket pushing one `RoomUpdate` per tick.
///
/// Ticks where the room does not exist yet send nothing.
pub async fn room_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = room_id(&id)?;
    let updates = state.driver.subscribe();
    Ok(ws.on_upgrade(move |socket| {
        push_frames(socket, updates, move |status| {
            RoomUpdate::from_status(status, &id)
                .map(|update| serde_json::to_string(&update))
                .transpose()
        })
    }))
}

async fn push_frames<F>(
    mut socket: WebSocket,
    mut updates: broadcast::Receiver<SystemStatus>,
    mut render: F,
) where
    F: FnMut(&SystemStatus) -> serde_json::Result<Option<String>>,
{
    loop {
        match updates.recv().await {
            Ok(status) => {
                let frame = match render(&status) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize status");
                        continue;
                    }
                };
                let Some(json) = frame else {
                    continue;
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!("status subscriber disconnected");
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "status subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::room::directory::StaticDirectory;
    use crate::runtime;
    use crate::sim::clock::SimClock;
    use crate::sim::engine::Engine;
    use crate::sim::types::EngineConfig;

    fn make_app() -> axum::Router {
        let engine = Engine::new(
            EngineConfig::new(2, 120.0),
            SimClock::new(6.0, Duration::from_secs(1)),
            StaticDirectory::default(),
        );
        let (driver, _task) = runtime::spawn(engine);
        router(Arc::new(AppState { driver }))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn control_returns_ack() {
        let app = make_app();
        let resp = app
            .oneshot(post_json(
                "/rooms/101/control",
                r#"{"target_temp":22.0,"fan_speed":"high","mode":"cool"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["accepted"], true);
        assert_eq!(json["room_id"], "101");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_control_returns_400_with_reason() {
        let app = make_app();
        let resp = app
            .oneshot(post_json(
                "/rooms/101/control",
                r#"{"target_temp":40.0,"fan_speed":"high","mode":"cool"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("40"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_room_returns_404() {
        let app = make_app();
        let resp = app.clone().oneshot(get("/rooms/999")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(post_json("/rooms/999/power-off", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_and_bill_after_control() {
        let app = make_app();
        app.clone()
            .oneshot(post_json(
                "/rooms/101/control",
                r#"{"target_temp":22.0,"fan_speed":"medium","mode":"cool","stay_id":"s-9"}"#,
            ))
            .await
            .unwrap();

        let resp = app.clone().oneshot(get("/rooms/101")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["state"], "running");
        assert_eq!(json["fan_speed"], "medium");
        assert_eq!(json["stay_id"], "s-9");

        let resp = app.oneshot(get("/rooms/101/bill")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["room_id"], "101");
        assert!(json["segments"].is_array());
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_discards_room() {
        let app = make_app();
        app.clone()
            .oneshot(post_json(
                "/rooms/101/control",
                r#"{"target_temp":22.0,"fan_speed":"low","mode":"cool"}"#,
            ))
            .await
            .unwrap();

        let resp = app
            .clone()
            .oneshot(post_json("/rooms/101/checkout", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(get("/rooms/101")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn status_and_health_return_200() {
        let app = make_app();
        let resp = app.clone().oneshot(get("/status")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["summary"]["capacity"], 2);
        assert!(json["rooms"].as_array().unwrap().is_empty());

        let resp = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn request_service_requeues_powered_off_room() {
        let app = make_app();
        app.clone()
            .oneshot(post_json(
                "/rooms/101/control",
                r#"{"target_temp":28.0,"fan_speed":"low","mode":"heat"}"#,
            ))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_json("/rooms/101/power-off", ""))
            .await
            .unwrap();

        let resp = app
            .clone()
            .oneshot(post_json("/rooms/101/request", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["accepted"], true);

        let json = body_json(app.clone().oneshot(get("/rooms/101")).await.unwrap()).await;
        assert_eq!(json["state"], "running");
        assert_eq!(json["target_temp"], 28.0);
        assert_eq!(json["fan_speed"], "low");
        assert_eq!(json["mode"], "heat");

        let resp = app
            .oneshot(post_json("/rooms/999/request", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn room_websocket_checks_id_before_upgrade() {
        let app = make_app();
        let uri = format!("/rooms/{}/ws", "x".repeat(40));
        let resp = app.clone().oneshot(get(&uri)).await.unwrap();
        assert!(resp.status().is_client_error());

        let resp = app.oneshot(get("/rooms/101/ws")).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test(start_paused = true)]
    async fn overlong_room_id_returns_400() {
        let app = make_app();
        let uri = format!("/rooms/{}", "x".repeat(40));
        let resp = app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
