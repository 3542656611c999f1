//! TOML-based scenario configuration and preset definitions.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use thiserror::Error;

use crate::request::{ControlRequest, TempLimits, validate_room_id};
use crate::room::directory::{RoomRecord, StaticDirectory};
use crate::room::types::RoomId;
use crate::sim::clock::SimClock;
use crate::sim::engine::Engine;
use crate::sim::event::{RequestAction, ScriptedRequest};
use crate::sim::types::{EngineConfig, PhysicsParams, Tariff};

/// Longest headless run a scenario may request.
pub const MAX_TICKS: u64 = 10_000_000;

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults. Load from TOML with
/// [`ScenarioConfig::from_toml_file`] or start from a preset with
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Capacity, time slice, and clock parameters.
    #[serde(default)]
    pub engine: EngineSection,
    /// Temperature response model.
    #[serde(default)]
    pub physics: PhysicsParams,
    /// Energy rates and unit price.
    #[serde(default)]
    pub tariff: Tariff,
    /// Accepted setpoint range.
    #[serde(default)]
    pub limits: TempLimits,
    /// Known room records.
    #[serde(default)]
    pub rooms: Vec<RoomRecord>,
    /// Scripted requests for headless runs.
    #[serde(default)]
    pub requests: Vec<ScriptedRequest>,
    /// Optional seeded random workload, appended to `requests`.
    #[serde(default)]
    pub random: Option<RandomWorkload>,
}

/// Scheduler and clock parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// Maximum concurrently served rooms (must be > 0).
    pub capacity: usize,
    /// Wait (simulated seconds) before a waiter may rotate in (must be > 0).
    pub time_slice_secs: f64,
    /// Simulated seconds per real second.
    pub acceleration: f64,
    /// Real milliseconds per driver tick.
    pub tick_period_ms: u64,
    /// Length of a headless run, in ticks.
    pub ticks: u64,
    /// Master random seed.
    pub seed: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            capacity: 3,
            time_slice_secs: 120.0,
            acceleration: 6.0,
            tick_period_ms: 1000,
            ticks: 300,
            seed: 42,
        }
    }
}

/// Seeded random request generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomWorkload {
    /// Number of generated rooms.
    pub rooms: usize,
    /// Number of generated requests.
    pub requests: usize,
    /// Requests are spread uniformly over `[0, span_ticks)`.
    pub span_ticks: u64,
}

impl Default for RandomWorkload {
    fn default() -> Self {
        Self {
            rooms: 8,
            requests: 60,
            span_ticks: 250,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"engine.capacity"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// One step of a room's acceptance timeline: a control or a power-off.
type Step = (u64, Option<(f64, &'static str)>);

fn timeline(room: &str, mode: &str, steps: &[Step]) -> Vec<ScriptedRequest> {
    steps
        .iter()
        .map(|&(tick, control)| match control {
            Some((target, fan)) => ScriptedRequest::control(tick, room, target, fan, mode),
            None => ScriptedRequest::power_off(tick, room),
        })
        .collect()
}

fn record(id: &str, initial_temp: f64) -> RoomRecord {
    RoomRecord {
        id: RoomId::from(id),
        initial_temp,
        stay_id: None,
    }
}

impl ScenarioConfig {
    /// Five cooling rooms sharing three units over thirty simulated minutes.
    ///
    /// Ten ticks make one simulated minute at the default clock.
    pub fn cool_test() -> Self {
        let mut requests = Vec::new();
        requests.extend(timeline("101", "cool", &[
            (0, Some((25.0, "medium"))),
            (10, Some((18.0, "medium"))),
            (50, Some((18.0, "high"))),
            (90, Some((22.0, "high"))),
            (140, None),
            (180, Some((22.0, "high"))),
            (240, None),
        ]));
        requests.extend(timeline("102", "cool", &[
            (10, Some((25.0, "medium"))),
            (30, Some((19.0, "medium"))),
            (60, None),
            (70, Some((19.0, "medium"))),
            (110, Some((22.0, "medium"))),
            (160, None),
            (190, Some((22.0, "medium"))),
            (250, None),
        ]));
        requests.extend(timeline("103", "cool", &[
            (20, Some((25.0, "medium"))),
            (140, Some((24.0, "low"))),
            (170, Some((24.0, "high"))),
            (220, None),
        ]));
        requests.extend(timeline("104", "cool", &[
            (30, Some((25.0, "medium"))),
            (90, Some((18.0, "high"))),
            (180, Some((20.0, "medium"))),
            (250, None),
        ]));
        requests.extend(timeline("105", "cool", &[
            (10, Some((25.0, "medium"))),
            (40, Some((22.0, "medium"))),
            (70, Some((22.0, "high"))),
            (120, Some((22.0, "low"))),
            (150, Some((20.0, "high"))),
            (200, Some((25.0, "high"))),
            (230, None),
        ]));

        Self {
            rooms: vec![
                record("101", 32.0),
                record("102", 28.0),
                record("103", 30.0),
                record("104", 29.0),
                record("105", 35.0),
            ],
            requests,
            ..Self::default()
        }
    }

    /// Five heating rooms sharing three units over thirty simulated minutes.
    pub fn heat_test() -> Self {
        let mut requests = Vec::new();
        requests.extend(timeline("201", "heat", &[
            (10, Some((23.0, "medium"))),
            (20, Some((24.0, "medium"))),
            (60, Some((24.0, "high"))),
            (100, Some((22.0, "high"))),
            (150, None),
            (190, Some((22.0, "high"))),
            (250, None),
        ]));
        requests.extend(timeline("202", "heat", &[
            (20, Some((23.0, "medium"))),
            (40, Some((25.0, "medium"))),
            (130, Some((25.0, "high"))),
            (210, Some((26.0, "medium"))),
            (260, None),
        ]));
        requests.extend(timeline("203", "heat", &[
            (30, Some((23.0, "medium"))),
            (50, Some((28.0, "medium"))),
            (150, Some((28.0, "low"))),
            (180, Some((28.0, "high"))),
            (250, None),
        ]));
        requests.extend(timeline("204", "heat", &[
            (40, Some((23.0, "medium"))),
            (100, Some((21.0, "high"))),
            (190, Some((25.0, "medium"))),
            (260, None),
        ]));
        requests.extend(timeline("205", "heat", &[
            (40, Some((23.0, "medium"))),
            (50, Some((23.0, "high"))),
            (80, Some((24.0, "high"))),
            (120, Some((24.0, "medium"))),
            (170, None),
            (210, Some((24.0, "medium"))),
            (250, None),
        ]));

        Self {
            rooms: vec![
                record("201", 10.0),
                record("202", 15.0),
                record("203", 18.0),
                record("204", 12.0),
                record("205", 14.0),
            ],
            requests,
            ..Self::default()
        }
    }

    /// A single unit contested by rooms at every priority.
    pub fn contention() -> Self {
        let mut requests = Vec::new();
        requests.extend(timeline("a", "cool", &[(0, Some((18.0, "medium")))]));
        requests.extend(timeline("b", "cool", &[(0, Some((18.0, "medium")))]));
        requests.extend(timeline("c", "cool", &[
            (30, Some((18.0, "high"))),
            (90, Some((18.0, "low"))),
        ]));
        requests.extend(timeline("d", "cool", &[(60, Some((18.0, "low"))), (150, None)]));

        Self {
            engine: EngineSection {
                capacity: 1,
                ticks: 200,
                ..EngineSection::default()
            },
            rooms: vec![
                record("a", 30.0),
                record("b", 30.0),
                record("c", 30.0),
                record("d", 30.0),
            ],
            requests,
            ..Self::default()
        }
    }

    /// Seeded random workload over the default engine.
    pub fn random() -> Self {
        Self {
            random: Some(RandomWorkload::default()),
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["cool_test", "heat_test", "contention", "random"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "cool_test" => Ok(Self::cool_test()),
            "heat_test" => Ok(Self::heat_test()),
            "contention" => Ok(Self::contention()),
            "random" => Ok(Self::random()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let e = &self.engine;

        if e.capacity == 0 {
            errors.push(ConfigError::new("engine.capacity", "must be > 0"));
        }
        if !(e.time_slice_secs > 0.0) {
            errors.push(ConfigError::new("engine.time_slice_secs", "must be > 0"));
        }
        if !(e.acceleration > 0.0) {
            errors.push(ConfigError::new("engine.acceleration", "must be > 0"));
        }
        if e.tick_period_ms == 0 {
            errors.push(ConfigError::new("engine.tick_period_ms", "must be > 0"));
        }
        if e.ticks > MAX_TICKS {
            errors.push(ConfigError::new(
                "engine.ticks",
                format!("must be <= {MAX_TICKS}"),
            ));
        }

        let p = &self.physics;
        for (field, value) in [
            ("physics.base_rate_per_min", p.base_rate_per_min),
            ("physics.low_multiplier", p.low_multiplier),
            ("physics.medium_multiplier", p.medium_multiplier),
            ("physics.high_multiplier", p.high_multiplier),
            ("physics.recovery_rate_per_min", p.recovery_rate_per_min),
            ("physics.hysteresis", p.hysteresis),
            ("tariff.low_rate", self.tariff.low_rate),
            ("tariff.medium_rate", self.tariff.medium_rate),
            ("tariff.high_rate", self.tariff.high_rate),
        ] {
            if !(value > 0.0) {
                errors.push(ConfigError::new(field, "must be > 0"));
            }
        }
        if !(self.tariff.unit_price >= 0.0) {
            errors.push(ConfigError::new("tariff.unit_price", "must be >= 0"));
        }
        if !p.default_initial_temp.is_finite() {
            errors.push(ConfigError::new("physics.default_initial_temp", "must be finite"));
        }
        if !(self.limits.min_temp < self.limits.max_temp) {
            errors.push(ConfigError::new("limits.min_temp", "must be < limits.max_temp"));
        }

        let mut known = BTreeSet::new();
        for (i, room) in self.rooms.iter().enumerate() {
            if let Err(err) = validate_room_id(room.id.as_str()) {
                errors.push(ConfigError::new(format!("rooms[{i}].id"), err.to_string()));
            }
            if !known.insert(room.id.as_str()) {
                errors.push(ConfigError::new(
                    format!("rooms[{i}].id"),
                    format!("duplicate room \"{}\"", room.id),
                ));
            }
            if !room.initial_temp.is_finite() {
                errors.push(ConfigError::new(
                    format!("rooms[{i}].initial_temp"),
                    "must be finite",
                ));
            }
        }

        for (i, request) in self.requests.iter().enumerate() {
            if !known.is_empty() && !known.contains(request.room.as_str()) {
                errors.push(ConfigError::new(
                    format!("requests[{i}].room"),
                    format!("unknown room \"{}\"", request.room),
                ));
            }
            let checked = match &request.action {
                RequestAction::Control(body) => body.validate(&request.room, &self.limits).map(|_| ()),
                RequestAction::PowerOff | RequestAction::RequestService => {
                    validate_room_id(&request.room).map(|_| ())
                }
            };
            if let Err(err) = checked {
                errors.push(ConfigError::new(format!("requests[{i}]"), err.to_string()));
            }
        }

        if let Some(random) = &self.random {
            if random.rooms == 0 {
                errors.push(ConfigError::new("random.rooms", "must be > 0"));
            }
            if random.span_ticks == 0 {
                errors.push(ConfigError::new("random.span_ticks", "must be > 0"));
            }
        }

        errors
    }

    /// Engine parameters.
    ///
    /// # Panics
    ///
    /// Panics on a configuration that fails [`validate`](Self::validate).
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::with_params(
            self.engine.capacity,
            self.engine.time_slice_secs,
            self.physics.clone(),
            self.tariff.clone(),
        )
        .with_limits(self.limits)
    }

    /// Driver clock.
    ///
    /// # Panics
    ///
    /// Panics on a configuration that fails [`validate`](Self::validate).
    pub fn clock(&self) -> SimClock {
        SimClock::new(
            self.engine.acceleration,
            Duration::from_millis(self.engine.tick_period_ms),
        )
    }

    /// Room records, including generated rooms of the random workload.
    pub fn room_records(&self) -> Vec<RoomRecord> {
        let mut records = self.rooms.clone();
        if let Some(random) = &self.random {
            records.extend(self.generate(random).0);
        }
        records
    }

    /// Scripted requests, including the random workload.
    pub fn script(&self) -> Vec<ScriptedRequest> {
        let mut requests = self.requests.clone();
        if let Some(random) = &self.random {
            requests.extend(self.generate(random).1);
        }
        requests
    }

    fn generate(&self, random: &RandomWorkload) -> (Vec<RoomRecord>, Vec<ScriptedRequest>) {
        const FANS: [&str; 3] = ["low", "medium", "high"];
        let mut rng = StdRng::seed_from_u64(self.engine.seed);
        let records: Vec<RoomRecord> = (1..=random.rooms)
            .map(|n| record(&format!("R{n:02}"), rng.random_range(26.0..=34.0)))
            .collect();
        if records.is_empty() || random.span_ticks == 0 {
            return (records, Vec::new());
        }

        let lo = self.limits.min_temp;
        let hi = self.limits.max_temp.min(25.0).max(lo);
        let requests = (0..random.requests)
            .map(|_| {
                let tick = rng.random_range(0..random.span_ticks);
                let room = records[rng.random_range(0..records.len())].id.as_str();
                if rng.random_bool(0.15) {
                    ScriptedRequest::power_off(tick, room)
                } else {
                    let target = (rng.random_range(lo..=hi) * 2.0).round() / 2.0;
                    let fan = FANS[rng.random_range(0..FANS.len())];
                    ScriptedRequest {
                        tick,
                        room: room.to_string(),
                        action: RequestAction::Control(ControlRequest::new(
                            target.clamp(lo, hi),
                            fan,
                            "cool",
                        )),
                    }
                }
            })
            .collect();
        (records, requests)
    }

    /// Validates the scenario and builds an engine for it.
    ///
    /// # Errors
    ///
    /// Returns every validation error if the scenario is invalid.
    pub fn build_engine(&self) -> Result<Engine, Vec<ConfigError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Engine::new(
            self.engine_config(),
            self.clock(),
            StaticDirectory::new(self.room_records()),
        ))
    }
}
