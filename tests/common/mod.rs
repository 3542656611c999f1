//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use hvac_sched::request::ControlRequest;
use hvac_sched::room::{RoomId, RoomRecord, RoomState, RoomUnit, StaticDirectory};
use hvac_sched::sim::clock::SimClock;
use hvac_sched::sim::engine::Engine;
use hvac_sched::sim::types::{EngineConfig, TickRecord};

/// Time slice used by the fixtures (simulated seconds).
pub const TIME_SLICE_SECS: f64 = 120.0;

/// Engine with `capacity` slots, the default 6 s step, and no room records.
pub fn engine(capacity: usize) -> Engine {
    engine_with_rooms(capacity, &[])
}

/// Engine whose directory knows `rooms` as `(id, initial_temp)` pairs.
pub fn engine_with_rooms(capacity: usize, rooms: &[(&str, f64)]) -> Engine {
    let records = rooms.iter().map(|&(id, initial_temp)| RoomRecord {
        id: RoomId::from(id),
        initial_temp,
        stay_id: None,
    });
    Engine::new(
        EngineConfig::new(capacity, TIME_SLICE_SECS),
        SimClock::default(),
        StaticDirectory::new(records),
    )
}

/// Sends a cooling control request that must be accepted.
pub fn cool(engine: &mut Engine, room: &str, target: f64, fan: &str) {
    let ack = engine
        .submit_control(room, &ControlRequest::new(target, fan, "cool"))
        .expect("request should validate");
    assert!(ack.accepted, "control for {room} not accepted: {ack:?}");
}

/// Runs `n` ticks and returns their records.
pub fn run(engine: &mut Engine, n: usize) -> Vec<TickRecord> {
    (0..n).map(|_| engine.tick()).collect()
}

pub fn id(s: &str) -> RoomId {
    RoomId::from(s)
}

pub fn unit<'a>(engine: &'a Engine, room: &str) -> &'a RoomUnit {
    engine
        .room(&id(room))
        .unwrap_or_else(|| panic!("room {room} should exist"))
}

pub fn state(engine: &Engine, room: &str) -> RoomState {
    unit(engine, room).state()
}

/// Simulated time a waiting room's current wait window started at.
pub fn wait_start(engine: &Engine, room: &str) -> f64 {
    unit(engine, room)
        .wait_since()
        .unwrap_or_else(|| panic!("room {room} should be waiting"))
        .secs
}
