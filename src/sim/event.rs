use serde::{Deserialize, Serialize};

use crate::request::ControlRequest;

/// What a scripted request asks the engine to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RequestAction {
    Control(ControlRequest),
    PowerOff,
    /// Re-queue the room under its current parameters.
    RequestService,
}

/// An external request scheduled at a fixed tick of a headless run.
///
/// Requests for tick `t` are applied when the clock reads `t`, before the
/// step that advances it to `t + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedRequest {
    pub tick: u64,
    pub room: String,
    #[serde(flatten)]
    pub action: RequestAction,
}

impl ScriptedRequest {
    pub fn control(tick: u64, room: &str, target_temp: f64, fan_speed: &str, mode: &str) -> Self {
        Self {
            tick,
            room: room.to_string(),
            action: RequestAction::Control(ControlRequest::new(target_temp, fan_speed, mode)),
        }
    }

    pub fn power_off(tick: u64, room: &str) -> Self {
        Self {
            tick,
            room: room.to_string(),
            action: RequestAction::PowerOff,
        }
    }

    pub fn request_service(tick: u64, room: &str) -> Self {
        Self {
            tick,
            room: room.to_string(),
            action: RequestAction::RequestService,
        }
    }
}
