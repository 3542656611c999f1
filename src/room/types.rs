//! Common types shared by room units, the scheduler, and the request boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::request::RequestError;

/// Stable identifier of one HVAC-served room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps an already-validated identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Fan setting, which doubles as the scheduling priority key.
///
/// Ordering is total: `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanSpeed {
    Low,
    Medium,
    High,
}

impl FanSpeed {
    /// Numeric priority: low=1, medium=2, high=3.
    pub fn priority(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanSpeed {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(RequestError::UnknownFanSpeed(other.to_string())),
        }
    }
}

/// Operating direction of a room unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Cool,
    Heat,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cool => "cool",
            Self::Heat => "heat",
        }
    }

    /// Returns `true` once `temp` has reached or crossed `target` in this direction.
    pub fn reached(self, temp: f64, target: f64) -> bool {
        match self {
            Self::Cool => temp <= target,
            Self::Heat => temp >= target,
        }
    }

    /// Signed distance `temp` has drifted away from `target`, against this direction.
    ///
    /// Positive when a cooling room is warmer than target or a heating room is colder.
    pub fn drift_past(self, temp: f64, target: f64) -> f64 {
        match self {
            Self::Cool => temp - target,
            Self::Heat => target - temp,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cool" => Ok(Self::Cool),
            "heat" => Ok(Self::Heat),
            other => Err(RequestError::UnknownMode(other.to_string())),
        }
    }
}

/// Lifecycle state of a room unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Off,
    Waiting,
    Running,
    Stopped,
}

impl RoomState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point on the simulated timeline plus a tie-breaking sequence number.
///
/// Two stamps taken at the same simulated second order by `seq`, so
/// "earliest" is always well defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamp {
    /// Simulated seconds since engine start.
    pub secs: f64,
    /// Monotonic sequence number minted by the scheduler.
    pub seq: u64,
}

impl Stamp {
    pub fn new(secs: f64, seq: u64) -> Self {
        Self { secs, seq }
    }
}

impl Eq for Stamp {}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.secs
            .total_cmp(&other.secs)
            .then(self.seq.cmp(&other.seq))
    }
}
