//! Core engine types: configuration, tick records, and observation payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::TempLimits;
use crate::room::types::{FanSpeed, Mode, RoomId, RoomState};

/// Rounds `value` to `places` decimal places.
///
/// Only used at observation boundaries (snapshots, bills, exports); internal
/// state keeps full precision.
pub fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Linear temperature-response parameters, in degrees per simulated minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsParams {
    /// Base heating/cooling rate while running at medium fan.
    pub base_rate_per_min: f64,
    /// Rate multiplier at low fan.
    pub low_multiplier: f64,
    /// Rate multiplier at medium fan.
    pub medium_multiplier: f64,
    /// Rate multiplier at high fan.
    pub high_multiplier: f64,
    /// Natural drift rate back toward the rest temperature.
    pub recovery_rate_per_min: f64,
    /// Drift past target (degrees) that re-triggers a stopped room.
    pub hysteresis: f64,
    /// Rest temperature for rooms the directory does not know.
    pub default_initial_temp: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            base_rate_per_min: 0.5,
            low_multiplier: 2.0 / 3.0,
            medium_multiplier: 1.0,
            high_multiplier: 2.0,
            recovery_rate_per_min: 0.5,
            hysteresis: 1.0,
            default_initial_temp: 26.0,
        }
    }
}

impl PhysicsParams {
    /// Running rate for `fan`, in degrees per simulated minute.
    pub fn rate_per_min(&self, fan: FanSpeed) -> f64 {
        let multiplier = match fan {
            FanSpeed::Low => self.low_multiplier,
            FanSpeed::Medium => self.medium_multiplier,
            FanSpeed::High => self.high_multiplier,
        };
        self.base_rate_per_min * multiplier
    }
}

/// Energy tariff: consumption per simulated minute at each fan setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tariff {
    pub low_rate: f64,
    pub medium_rate: f64,
    pub high_rate: f64,
    /// Currency units per energy unit.
    pub unit_price: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            low_rate: 1.0 / 3.0,
            medium_rate: 0.5,
            high_rate: 1.0,
            unit_price: 1.0,
        }
    }
}

impl Tariff {
    /// Energy units consumed per simulated minute at `fan`.
    pub fn energy_rate(&self, fan: FanSpeed) -> f64 {
        match fan {
            FanSpeed::Low => self.low_rate,
            FanSpeed::Medium => self.medium_rate,
            FanSpeed::High => self.high_rate,
        }
    }
}

/// Validated engine configuration.
///
/// # Examples
///
/// ```
/// use hvac_sched::sim::types::EngineConfig;
///
/// let cfg = EngineConfig::new(3, 120.0);
/// assert_eq!(cfg.capacity, 3);
/// assert_eq!(cfg.physics.hysteresis, 1.0);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    /// Maximum number of concurrently served rooms.
    pub capacity: usize,
    /// Simulated seconds a waiter must accrue before it may rotate in.
    pub time_slice_secs: f64,
    pub physics: PhysicsParams,
    pub tariff: Tariff,
    /// Setpoint range enforced on raw requests.
    pub limits: TempLimits,
}

impl EngineConfig {
    /// Creates a configuration with default physics and tariff.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or `time_slice_secs` is not positive.
    pub fn new(capacity: usize, time_slice_secs: f64) -> Self {
        Self::with_params(
            capacity,
            time_slice_secs,
            PhysicsParams::default(),
            Tariff::default(),
        )
    }

    /// Creates a configuration with explicit physics and tariff.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or `time_slice_secs` is not positive.
    pub fn with_params(
        capacity: usize,
        time_slice_secs: f64,
        physics: PhysicsParams,
        tariff: Tariff,
    ) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        assert!(time_slice_secs > 0.0, "time_slice_secs must be > 0");
        Self {
            capacity,
            time_slice_secs,
            physics,
            tariff,
            limits: TempLimits::default(),
        }
    }

    /// Replaces the accepted setpoint range.
    pub fn with_limits(mut self, limits: TempLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Externally visible state of one room unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub stay_id: Option<String>,
    pub current_temp: f64,
    pub initial_temp: f64,
    pub target_temp: f64,
    pub fan_speed: FanSpeed,
    pub mode: Mode,
    pub state: RoomState,
    /// Running fee since the ledger was opened.
    pub fee: f64,
    /// Running energy since the ledger was opened.
    pub energy: f64,
    /// Total simulated seconds spent running.
    pub service_secs: f64,
    /// Simulated seconds in the current wait window (0 unless waiting).
    pub wait_secs: f64,
    /// Simulated seconds in the current service window (0 unless running).
    pub served_secs: f64,
}

/// Lifecycle counts across all known rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub total_rooms: usize,
    pub running: usize,
    pub waiting: usize,
    pub stopped: usize,
    pub off: usize,
    pub capacity: usize,
}

impl StateCounts {
    /// Tallies `states` against a scheduler of `capacity`.
    pub fn tally(states: impl IntoIterator<Item = RoomState>, capacity: usize) -> Self {
        let mut counts = Self {
            capacity,
            ..Self::default()
        };
        for state in states {
            counts.total_rooms += 1;
            match state {
                RoomState::Running => counts.running += 1,
                RoomState::Waiting => counts.waiting += 1,
                RoomState::Stopped => counts.stopped += 1,
                RoomState::Off => counts.off += 1,
            }
        }
        counts
    }
}

/// Periodic status broadcast: every room plus system aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub tick: u64,
    pub time_secs: f64,
    pub rooms: Vec<RoomSnapshot>,
    pub in_service: Vec<RoomId>,
    pub waiting: Vec<RoomId>,
    pub summary: StateCounts,
}

impl SystemStatus {
    /// Serializes the payload for a push channel.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Acknowledgment returned for every external request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub accepted: bool,
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Ack {
    pub fn accepted(room_id: &RoomId) -> Self {
        Self {
            accepted: true,
            room_id: room_id.to_string(),
            reason: None,
        }
    }

    pub fn rejected(room_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            room_id: room_id.into(),
            reason: Some(reason.into()),
        }
    }
}

/// Complete record of one driver tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    /// Tick index (1-based: the first tick advances the clock to one step).
    pub tick: u64,
    /// Simulated time after this tick, in seconds.
    pub time_secs: f64,
    pub counts: StateCounts,
    pub in_service: Vec<RoomId>,
    pub waiting: Vec<RoomId>,
    /// Cumulative energy across all current ledgers.
    pub total_energy: f64,
    /// Cumulative fee across all current ledgers.
    pub total_fee: f64,
    /// Admissions performed during this tick (backfill and rotation).
    pub admissions: u64,
    /// Priority preemptions performed during this tick.
    pub preemptions: u64,
    /// Time-slice rotations performed during this tick.
    pub rotations: u64,
}

impl fmt::Display for TickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = |v: &[RoomId]| {
            v.iter()
                .map(RoomId::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };
        write!(
            f,
            "t={:>4} ({:>6.0}s) | run={} wait={} stop={} off={} | serving=[{}] queue=[{}] \
             | energy={:.3} fee={:.2} | rot={} pre={}",
            self.tick,
            self.time_secs,
            self.counts.running,
            self.counts.waiting,
            self.counts.stopped,
            self.counts.off,
            ids(&self.in_service),
            ids(&self.waiting),
            self.total_energy,
            self.total_fee,
            self.rotations,
            self.preemptions,
        )
    }
}
