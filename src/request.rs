//! Boundary validation of external control requests.
//!
//! Raw requests carry strings and unchecked numbers. They are turned into a
//! [`ValidatedControl`] here, so the engine only ever sees well-formed input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::room::types::{FanSpeed, Mode, RoomId};

/// Longest accepted room identifier.
pub const MAX_ROOM_ID_LEN: usize = 32;

/// Reasons a request is rejected before it reaches the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error("invalid room id {0:?}: expected at most 32 characters of [A-Za-z0-9_-]")]
    InvalidRoomId(String),
    #[error("unknown fan speed {0:?}: expected low, medium, or high")]
    UnknownFanSpeed(String),
    #[error("unknown mode {0:?}: expected cool or heat")]
    UnknownMode(String),
    #[error("target temperature {value} outside accepted range [{min}, {max}]")]
    TemperatureOutOfRange { value: f64, min: f64, max: f64 },
    #[error("{field} must be a finite number")]
    NonFiniteTemperature { field: &'static str },
}

/// Accepted setpoint range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TempLimits {
    pub min_temp: f64,
    pub max_temp: f64,
}

impl Default for TempLimits {
    fn default() -> Self {
        Self {
            min_temp: 16.0,
            max_temp: 30.0,
        }
    }
}

/// Validates a raw room identifier.
///
/// # Errors
///
/// Returns [`RequestError::EmptyRoomId`] or [`RequestError::InvalidRoomId`].
///
/// # Examples
///
/// ```
/// use hvac_sched::request::validate_room_id;
///
/// assert_eq!(validate_room_id("101").map(|id| id.to_string()), Ok("101".to_string()));
/// assert!(validate_room_id("").is_err());
/// assert!(validate_room_id("a b").is_err());
/// ```
pub fn validate_room_id(raw: &str) -> Result<RoomId, RequestError> {
    if raw.is_empty() {
        return Err(RequestError::EmptyRoomId);
    }
    let well_formed = raw.len() <= MAX_ROOM_ID_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !well_formed {
        return Err(RequestError::InvalidRoomId(raw.to_string()));
    }
    Ok(RoomId::new(raw))
}

/// Unvalidated body of a control request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub target_temp: f64,
    pub fan_speed: String,
    pub mode: String,
    #[serde(default)]
    pub stay_id: Option<String>,
    /// Rest temperature for a room that does not exist yet.
    #[serde(default)]
    pub initial_temp: Option<f64>,
}

/// A control request that passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedControl {
    pub room_id: RoomId,
    pub target_temp: f64,
    pub fan_speed: FanSpeed,
    pub mode: Mode,
    pub stay_id: Option<String>,
    pub initial_temp: Option<f64>,
}

impl ControlRequest {
    pub fn new(target_temp: f64, fan_speed: &str, mode: &str) -> Self {
        Self {
            target_temp,
            fan_speed: fan_speed.to_string(),
            mode: mode.to_string(),
            stay_id: None,
            initial_temp: None,
        }
    }

    /// Checks every field and returns the typed request for `room`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RequestError`] found, checking the room id, then
    /// the fan speed, the mode, and finally the temperatures.
    pub fn validate(&self, room: &str, limits: &TempLimits) -> Result<ValidatedControl, RequestError> {
        let room_id = validate_room_id(room)?;
        let fan_speed: FanSpeed = self.fan_speed.parse()?;
        let mode: Mode = self.mode.parse()?;

        if !self.target_temp.is_finite() {
            return Err(RequestError::NonFiniteTemperature {
                field: "target_temp",
            });
        }
        if self.target_temp < limits.min_temp || self.target_temp > limits.max_temp {
            return Err(RequestError::TemperatureOutOfRange {
                value: self.target_temp,
                min: limits.min_temp,
                max: limits.max_temp,
            });
        }
        if self.initial_temp.is_some_and(|t| !t.is_finite()) {
            return Err(RequestError::NonFiniteTemperature {
                field: "initial_temp",
            });
        }

        Ok(ValidatedControl {
            room_id,
            target_temp: self.target_temp,
            fan_speed,
            mode,
            stay_id: self.stay_id.clone(),
            initial_temp: self.initial_temp,
        })
    }
}
