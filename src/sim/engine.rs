//! Simulation engine: owns the room units, the scheduler, and the clock,
//! and drives one physics-then-scheduling step per tick.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::request::{ControlRequest, RequestError, ValidatedControl, validate_room_id};
use crate::room::directory::{RoomDirectory, StaticDirectory};
use crate::room::ledger::Bill;
use crate::room::types::{RoomId, RoomState};
use crate::room::unit::{RoomUnit, Transition};

use super::clock::SimClock;
use super::event::{RequestAction, ScriptedRequest};
use super::scheduler::{Rooms, Scheduler, SchedulerCounters};
use super::types::{Ack, EngineConfig, RoomSnapshot, StateCounts, SystemStatus, TickRecord};

/// Single owner of all scheduling and physics state.
///
/// Generic over the room directory so hosts can plug in their own record
/// lookup. Every public operation runs to completion before returning, so
/// callers serialize requests against ticks simply by holding `&mut self`.
pub struct Engine<D: RoomDirectory = StaticDirectory> {
    config: EngineConfig,
    clock: SimClock,
    scheduler: Scheduler,
    rooms: Rooms,
    directory: D,
    /// Scheduler counters as of the last emitted record.
    last_counters: SchedulerCounters,
}

impl<D: RoomDirectory> Engine<D> {
    /// Creates an engine with no rooms materialized yet.
    ///
    /// # Arguments
    ///
    /// * `config` - Capacity, time slice, physics, tariff, and request limits
    /// * `clock` - Simulated clock; its step length drives every tick
    /// * `directory` - Source of initial temperatures and stay ids
    pub fn new(config: EngineConfig, clock: SimClock, directory: D) -> Self {
        let scheduler = Scheduler::new(config.capacity, config.time_slice_secs);
        Self {
            config,
            clock,
            scheduler,
            rooms: Rooms::new(),
            directory,
            last_counters: SchedulerCounters::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn room(&self, id: &RoomId) -> Option<&RoomUnit> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &RoomUnit> {
        self.rooms.values()
    }

    /// Validates a raw control request and applies it.
    ///
    /// # Arguments
    ///
    /// * `room` - Raw room id from the caller
    /// * `request` - Unvalidated setpoint, fan speed, and mode
    ///
    /// # Errors
    ///
    /// Returns the boundary [`RequestError`]; the engine is left untouched.
    pub fn submit_control(&mut self, room: &str, request: &ControlRequest) -> Result<Ack, RequestError> {
        match request.validate(room, &self.config.limits) {
            Ok(control) => Ok(self.control(control)),
            Err(err) => {
                warn!(room, error = %err, "rejected control request");
                Err(err)
            }
        }
    }

    /// Applies validated setpoint parameters and (re)queues the room.
    ///
    /// Materializes the room on first reference, using the request's
    /// `initial_temp`, then the directory, then the configured default.
    pub fn control(&mut self, control: ValidatedControl) -> Ack {
        let ValidatedControl {
            room_id,
            target_temp,
            fan_speed,
            mode,
            stay_id,
            initial_temp,
        } = control;
        let now = self.clock.now_secs();

        if !self.rooms.contains_key(&room_id) {
            let initial = initial_temp
                .or_else(|| self.directory.initial_temp(&room_id))
                .unwrap_or(self.config.physics.default_initial_temp);
            let mut unit = RoomUnit::new(room_id.clone(), initial, self.config.tariff.unit_price);
            unit.apply_control(
                initial,
                fan_speed,
                mode,
                self.directory.stay_id(&room_id),
            );
            info!(room = %room_id, initial_temp = initial, "room materialized");
            self.rooms.insert(room_id.clone(), unit);
        }

        if let Some(unit) = self.rooms.get_mut(&room_id) {
            unit.apply_control(target_temp, fan_speed, mode, stay_id);
        }
        info!(
            room = %room_id,
            target_temp,
            fan = %fan_speed,
            mode = %mode,
            "control applied"
        );
        self.scheduler.request_service(&room_id, &mut self.rooms, now);
        Ack::accepted(&room_id)
    }

    /// Re-queues a known room under its current setpoint, fan speed, and mode.
    ///
    /// # Arguments
    ///
    /// * `id` - Room to bring back into the queue
    ///
    /// # Returns
    ///
    /// `false` if the room is unknown. A room that is already running or
    /// waiting keeps its place and the call returns `true`.
    pub fn request_service(&mut self, id: &RoomId) -> bool {
        let Some(unit) = self.rooms.get(id) else {
            return false;
        };
        if matches!(unit.state(), RoomState::Running | RoomState::Waiting) {
            return true;
        }
        let now = self.clock.now_secs();
        info!(room = %id, "service requested");
        self.scheduler.request_service(id, &mut self.rooms, now)
    }

    /// Boundary-facing service request: validates the raw id first.
    pub fn submit_request_service(&mut self, room: &str) -> Ack {
        match validate_room_id(room) {
            Ok(id) if self.request_service(&id) => Ack::accepted(&id),
            Ok(_) => Ack::rejected(room, "unknown room"),
            Err(err) => {
                warn!(room, error = %err, "rejected service request");
                Ack::rejected(room, err.to_string())
            }
        }
    }

    /// Powers a room off from any state and backfills its slot.
    ///
    /// Returns `false` if the room is unknown.
    pub fn power_off(&mut self, id: &RoomId) -> bool {
        let Some(unit) = self.rooms.get_mut(id) else {
            return false;
        };
        unit.power_off();
        let now = self.clock.now_secs();
        self.scheduler.withdraw(id, &mut self.rooms, now);
        info!(room = %id, "powered off");
        true
    }

    /// Boundary-facing power-off: validates the raw id first.
    pub fn submit_power_off(&mut self, room: &str) -> Ack {
        match validate_room_id(room) {
            Ok(id) if self.power_off(&id) => Ack::accepted(&id),
            Ok(_) => Ack::rejected(room, "unknown room"),
            Err(err) => {
                warn!(room, error = %err, "rejected power-off request");
                Ack::rejected(room, err.to_string())
            }
        }
    }

    pub fn room_status(&self, id: &RoomId) -> Option<RoomSnapshot> {
        let now = self.clock.now_secs();
        self.rooms.get(id).map(|u| u.snapshot(now))
    }

    pub fn bill(&self, id: &RoomId) -> Option<Bill> {
        self.rooms.get(id).map(RoomUnit::bill)
    }

    /// Powers the room off, discards it, and returns its final bill.
    ///
    /// # Returns
    ///
    /// The final `Bill`, or `None` if the room is unknown. A later control
    /// request for the same id starts a fresh ledger.
    pub fn checkout(&mut self, id: &RoomId) -> Option<Bill> {
        if !self.power_off(id) {
            return None;
        }
        let unit = self.rooms.remove(id)?;
        let bill = unit.bill();
        info!(room = %id, fee = bill.total_fee, "checked out");
        Some(bill)
    }

    pub fn state_counts(&self) -> StateCounts {
        StateCounts::tally(
            self.rooms.values().map(RoomUnit::state),
            self.scheduler.capacity(),
        )
    }

    /// Broadcast payload: every room snapshot plus system aggregates.
    pub fn system_status(&self) -> SystemStatus {
        let now = self.clock.now_secs();
        SystemStatus {
            tick: self.clock.tick(),
            time_secs: now,
            rooms: self.rooms.values().map(|u| u.snapshot(now)).collect(),
            in_service: self.scheduler.in_service().to_vec(),
            waiting: self.scheduler.waiting().to_vec(),
            summary: self.state_counts(),
        }
    }

    /// Executes one driver step and returns its record.
    ///
    /// Physics for every room runs before any scheduling, so a room that
    /// reaches target is backfilled within the same tick.
    ///
    /// # Returns
    ///
    /// The post-step `TickRecord`. Its activity counts cover everything the
    /// scheduler did since the previous record, including admissions and
    /// preemptions triggered by requests applied between ticks.
    pub fn tick(&mut self) -> TickRecord {
        let step = self.clock.advance();
        let now = self.clock.now_secs();
        let start = now - step;

        let mut released = Vec::new();
        let mut restarts = Vec::new();
        for (id, unit) in self.rooms.iter_mut() {
            match unit.advance(start, step, &self.config.physics, &self.config.tariff) {
                Some(Transition::ReachedTarget) => released.push(id.clone()),
                Some(Transition::RestartRequested) => restarts.push(id.clone()),
                None => {}
            }
        }

        for id in &released {
            info!(room = %id, "target reached");
            self.scheduler.release_from_service(id, &mut self.rooms, now);
        }
        for id in &restarts {
            info!(room = %id, "hysteresis restart requested");
            self.scheduler.request_service(id, &mut self.rooms, now);
        }
        self.scheduler.tick(&mut self.rooms, now);

        let record = self.record();
        self.last_counters = self.scheduler.counters();
        debug!(
            tick = record.tick,
            running = record.counts.running,
            waiting = record.counts.waiting,
            "tick"
        );
        record
    }

    fn record(&self) -> TickRecord {
        let before = self.last_counters;
        let after = self.scheduler.counters();
        let (total_energy, total_fee) = self.rooms.values().fold((0.0, 0.0), |(e, f), u| {
            (e + u.ledger().total_energy(), f + u.ledger().total_fee())
        });
        TickRecord {
            tick: self.clock.tick(),
            time_secs: self.clock.now_secs(),
            counts: self.state_counts(),
            in_service: self.scheduler.in_service().to_vec(),
            waiting: self.scheduler.waiting().to_vec(),
            total_energy,
            total_fee,
            admissions: after.admissions - before.admissions,
            preemptions: after.preemptions - before.preemptions,
            rotations: after.rotations - before.rotations,
        }
    }

    /// Applies one scripted request through the request boundary.
    pub fn apply(&mut self, request: &ScriptedRequest) -> Ack {
        match &request.action {
            RequestAction::Control(body) => self
                .submit_control(&request.room, body)
                .unwrap_or_else(|err| Ack::rejected(request.room.as_str(), err.to_string())),
            RequestAction::PowerOff => self.submit_power_off(&request.room),
            RequestAction::RequestService => self.submit_request_service(&request.room),
        }
    }

    /// Runs `ticks` steps, applying each scripted request when the clock
    /// reaches its tick.
    ///
    /// # Arguments
    ///
    /// * `requests` - Scripted requests in any order; ties keep their order
    /// * `ticks` - Number of steps to execute
    ///
    /// # Returns
    ///
    /// One `TickRecord` per step.
    pub fn run_script(&mut self, requests: &[ScriptedRequest], ticks: u64) -> Vec<TickRecord> {
        let mut ordered: Vec<&ScriptedRequest> = requests.iter().collect();
        ordered.sort_by_key(|r| r.tick);
        let mut pending = ordered.into_iter().peekable();

        let mut records = Vec::new();
        for _ in 0..ticks {
            let now_tick = self.clock.tick();
            while let Some(request) = pending.next_if(|r| r.tick <= now_tick) {
                self.apply(request);
            }
            records.push(self.tick());
        }
        records
    }

    /// Lists every violated structural invariant; empty when consistent.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let in_service = self.scheduler.in_service();
        let waiting = self.scheduler.waiting();

        if in_service.len() > self.scheduler.capacity() {
            violations.push(format!(
                "in-service size {} exceeds capacity {}",
                in_service.len(),
                self.scheduler.capacity()
            ));
        }

        let serving: HashSet<&RoomId> = in_service.iter().collect();
        let queued: HashSet<&RoomId> = waiting.iter().collect();
        if serving.len() != in_service.len() {
            violations.push("duplicate room in service".to_string());
        }
        if queued.len() != waiting.len() {
            violations.push("duplicate room in waiting".to_string());
        }
        for id in serving.intersection(&queued) {
            violations.push(format!("room {id} both in service and waiting"));
        }

        for id in serving.iter().chain(queued.iter()) {
            if !self.rooms.contains_key(*id) {
                violations.push(format!("scheduler references unknown room {id}"));
            }
        }

        for (id, unit) in &self.rooms {
            let running = unit.state() == RoomState::Running;
            if running != serving.contains(id) {
                violations.push(format!(
                    "room {id} is {} but in-service membership is {}",
                    unit.state(),
                    serving.contains(id)
                ));
            }
            let is_waiting = unit.state() == RoomState::Waiting;
            if is_waiting != queued.contains(id) {
                violations.push(format!(
                    "room {id} is {} but waiting membership is {}",
                    unit.state(),
                    queued.contains(id)
                ));
            }
            let fee_sum: f64 = unit.ledger().segments().iter().map(|s| s.fee).sum();
            if (fee_sum - unit.ledger().total_fee()).abs() > 1e-9 {
                violations.push(format!("room {id} ledger total differs from segment sum"));
            }
        }
        violations
    }
}
