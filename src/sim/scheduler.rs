//! Shared-capacity scheduler: admission, priority preemption, and
//! time-slice rotation.
//!
//! The scheduler holds room ids only. Room units live in the engine's room
//! map, which every operation borrows mutably for the duration of the call.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::room::types::{RoomId, Stamp};
use crate::room::unit::RoomUnit;

/// Authoritative room collection owned by the engine.
pub type Rooms = BTreeMap<RoomId, RoomUnit>;

/// Cumulative scheduling activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerCounters {
    pub admissions: u64,
    pub preemptions: u64,
    pub rotations: u64,
}

/// Bounded in-service set plus an unordered waiting collection.
///
/// Waiters are always served by priority, then by earliest wait stamp; the
/// collection order itself carries no meaning.
#[derive(Debug, Clone)]
pub struct Scheduler {
    capacity: usize,
    time_slice_secs: f64,
    in_service: Vec<RoomId>,
    waiting: Vec<RoomId>,
    seq: u64,
    counters: SchedulerCounters,
}

impl Scheduler {
    /// # Panics
    ///
    /// Panics if `capacity` is zero or `time_slice_secs` is not positive.
    pub fn new(capacity: usize, time_slice_secs: f64) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        assert!(time_slice_secs > 0.0, "time_slice_secs must be > 0");
        Self {
            capacity,
            time_slice_secs,
            in_service: Vec::with_capacity(capacity),
            waiting: Vec::new(),
            seq: 0,
            counters: SchedulerCounters::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_service(&self) -> &[RoomId] {
        &self.in_service
    }

    pub fn waiting(&self) -> &[RoomId] {
        &self.waiting
    }

    pub fn counters(&self) -> SchedulerCounters {
        self.counters
    }

    pub fn is_full(&self) -> bool {
        self.in_service.len() >= self.capacity
    }

    fn stamp(&mut self, now_secs: f64) -> Stamp {
        self.seq += 1;
        Stamp::new(now_secs, self.seq)
    }

    fn detach(&mut self, id: &RoomId) {
        self.in_service.retain(|r| r != id);
        self.waiting.retain(|r| r != id);
    }

    /// Queues `id` with a fresh wait window, then tries preemption and a
    /// direct fill.
    ///
    /// Repeated calls restart the room's wait window. Returns `false` if the
    /// room is unknown.
    pub fn request_service(&mut self, id: &RoomId, rooms: &mut Rooms, now_secs: f64) -> bool {
        if !rooms.contains_key(id) {
            return false;
        }
        self.detach(id);
        let stamp = self.stamp(now_secs);
        if let Some(unit) = rooms.get_mut(id) {
            unit.enter_waiting(stamp);
        }
        self.waiting.push(id.clone());

        self.try_preempt(id, rooms, now_secs);
        self.fill(rooms, now_secs);
        true
    }

    /// Drops `id` from service without requeueing it, then backfills.
    ///
    /// Returns `false` if the room was not in service.
    pub fn release_from_service(&mut self, id: &RoomId, rooms: &mut Rooms, now_secs: f64) -> bool {
        let before = self.in_service.len();
        self.in_service.retain(|r| r != id);
        let released = self.in_service.len() != before;
        self.fill(rooms, now_secs);
        released
    }

    /// Removes `id` from both collections (power-off), then backfills.
    pub fn withdraw(&mut self, id: &RoomId, rooms: &mut Rooms, now_secs: f64) {
        self.detach(id);
        self.fill(rooms, now_secs);
    }

    /// Per-step evaluation: at most one rotation, then backfill.
    pub fn tick(&mut self, rooms: &mut Rooms, now_secs: f64) {
        self.rotate(rooms, now_secs);
        self.fill(rooms, now_secs);
    }

    /// Admits the best waiters while capacity remains.
    fn fill(&mut self, rooms: &mut Rooms, now_secs: f64) {
        while !self.is_full() {
            let Some(next) = self.best_waiter(rooms) else {
                break;
            };
            self.admit(&next, rooms, now_secs);
            info!(room = %next, "admitted");
        }
    }

    /// Highest priority, then earliest wait stamp.
    fn best_waiter(&self, rooms: &Rooms) -> Option<RoomId> {
        self.waiting_by_rank(rooms).into_iter().next()
    }

    /// Waiters ordered by priority (desc), then wait stamp (asc).
    fn waiting_by_rank(&self, rooms: &Rooms) -> Vec<RoomId> {
        let mut ranked: Vec<(Reverse<u8>, Option<Stamp>, &RoomId)> = self
            .waiting
            .iter()
            .filter_map(|id| {
                rooms
                    .get(id)
                    .map(|u| (Reverse(u.priority()), u.wait_since(), id))
            })
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, _, id)| id.clone()).collect()
    }

    /// Longest continuously served in-service room at exactly `priority`.
    fn oldest_served_at(&self, priority: u8, rooms: &Rooms) -> Option<RoomId> {
        self.in_service
            .iter()
            .filter_map(|id| rooms.get(id).map(|u| (u, id)))
            .filter(|(u, _)| u.priority() == priority)
            .min_by_key(|(u, _)| u.serving_since())
            .map(|(_, id)| id.clone())
    }

    fn admit(&mut self, id: &RoomId, rooms: &mut Rooms, now_secs: f64) {
        self.waiting.retain(|r| r != id);
        let stamp = self.stamp(now_secs);
        if let Some(unit) = rooms.get_mut(id) {
            unit.begin_service(stamp);
        }
        self.in_service.push(id.clone());
        self.counters.admissions += 1;
    }

    fn evict(&mut self, id: &RoomId, rooms: &mut Rooms, now_secs: f64) {
        self.in_service.retain(|r| r != id);
        let stamp = self.stamp(now_secs);
        if let Some(unit) = rooms.get_mut(id) {
            unit.enter_waiting(stamp);
        }
        self.waiting.push(id.clone());
    }

    /// Evicts the weakest in-service room in favour of `requester` when the
    /// requester's priority is strictly higher.
    fn try_preempt(&mut self, requester: &RoomId, rooms: &mut Rooms, now_secs: f64) -> bool {
        if !self.is_full() {
            return false;
        }
        let Some(priority) = rooms.get(requester).map(RoomUnit::priority) else {
            return false;
        };
        let Some(floor) = self
            .in_service
            .iter()
            .filter_map(|id| rooms.get(id).map(RoomUnit::priority))
            .min()
        else {
            return false;
        };
        if priority <= floor {
            return false;
        }
        let Some(victim) = self.oldest_served_at(floor, rooms) else {
            return false;
        };

        self.evict(&victim, rooms, now_secs);
        self.admit(requester, rooms, now_secs);
        self.counters.preemptions += 1;
        info!(room = %requester, victim = %victim, "preempted");
        true
    }

    /// Swaps one eligible waiter with the longest-served in-service room of
    /// the same priority.
    ///
    /// Candidates below the time slice are skipped, as are candidates with no
    /// same-priority victim; neither has its wait window touched.
    fn rotate(&mut self, rooms: &mut Rooms, now_secs: f64) -> bool {
        if !self.is_full() || self.waiting.is_empty() {
            return false;
        }
        for candidate in self.waiting_by_rank(rooms) {
            let Some(unit) = rooms.get(&candidate) else {
                continue;
            };
            let waited = unit.wait_since().map_or(0.0, |s| now_secs - s.secs);
            if waited < self.time_slice_secs {
                continue;
            }
            let Some(victim) = self.oldest_served_at(unit.priority(), rooms) else {
                continue;
            };

            self.evict(&victim, rooms, now_secs);
            self.admit(&candidate, rooms, now_secs);
            self.counters.rotations += 1;
            info!(room = %candidate, victim = %victim, waited_secs = waited, "rotated");
            return true;
        }
        false
    }
}
