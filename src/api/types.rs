//! API response types.

use serde::Serialize;

use crate::room::types::RoomId;
use crate::sim::types::{RoomSnapshot, SystemStatus};

/// Error response body for 4xx/5xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Liveness payload for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tick: u64,
}

/// Per-room push frame for `GET /rooms/{id}/ws`.
#[derive(Debug, Serialize)]
pub struct RoomUpdate {
    pub tick: u64,
    pub time_secs: f64,
    pub room: RoomSnapshot,
}

impl RoomUpdate {
    /// Picks `id` out of a status broadcast; `None` while the room is unknown.
    pub fn from_status(status: &SystemStatus, id: &RoomId) -> Option<Self> {
        let room = status.rooms.iter().find(|r| &r.room_id == id)?;
        Some(Self {
            tick: status.tick,
            time_secs: status.time_secs,
            room: room.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::request::ControlRequest;
    use crate::room::directory::StaticDirectory;
    use crate::sim::clock::SimClock;
    use crate::sim::engine::Engine;
    use crate::sim::types::EngineConfig;

    #[test]
    fn error_response_serializes_message() {
        let json = serde_json::to_value(ErrorResponse::new("unknown room")).expect("serialize");
        assert_eq!(json["error"], "unknown room");
    }

    #[test]
    fn health_response_fields() {
        let json = serde_json::to_value(HealthResponse {
            status: "ok",
            tick: 7,
        })
        .expect("serialize");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["tick"], 7);
    }

    #[test]
    fn room_update_selects_one_room() {
        let mut engine = Engine::new(
            EngineConfig::new(1, 120.0),
            SimClock::new(6.0, Duration::from_secs(1)),
            StaticDirectory::default(),
        );
        for room in ["101", "102"] {
            engine
                .submit_control(room, &ControlRequest::new(20.0, "medium", "cool"))
                .expect("valid");
        }
        engine.tick();
        let status = engine.system_status();

        let update = RoomUpdate::from_status(&status, &RoomId::from("102")).expect("known room");
        assert_eq!(update.tick, 1);
        assert_eq!(update.room.room_id, RoomId::from("102"));
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json["room"]["state"], "waiting");

        assert!(RoomUpdate::from_status(&status, &RoomId::from("999")).is_none());
    }
}
