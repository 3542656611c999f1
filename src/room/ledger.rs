use serde::Serialize;

use super::types::{FanSpeed, RoomId};
use crate::sim::types::round_dp;

/// One contiguous billed interval of service at a fixed fan setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Stay/record tag supplied by the collaborator, if any.
    pub stay_id: Option<String>,
    /// Simulated second at which the interval began.
    pub start_secs: f64,
    /// Billed duration in simulated minutes.
    pub duration_minutes: f64,
    /// Fan setting for the whole interval.
    pub fan_speed: FanSpeed,
    /// Energy units consumed.
    pub energy: f64,
    /// Fee charged for `energy`.
    pub fee: f64,
}

/// Per-room usage ledger.
///
/// Append-only: segments grow only while the owning room is running, and
/// `total_energy`/`total_fee` always equal the sums over `segments`.
#[derive(Debug, Clone)]
pub struct Ledger {
    unit_price: f64,
    stay_id: Option<String>,
    segments: Vec<Segment>,
    total_energy: f64,
    total_fee: f64,
    /// Whether the last segment may still be extended.
    open: bool,
}

impl Ledger {
    /// Creates an empty ledger charging `unit_price` per energy unit.
    pub fn new(unit_price: f64) -> Self {
        Self {
            unit_price,
            stay_id: None,
            segments: Vec::new(),
            total_energy: 0.0,
            total_fee: 0.0,
            open: false,
        }
    }

    /// Tags every subsequent segment with `stay_id`.
    pub fn set_stay_id(&mut self, stay_id: Option<String>) {
        if self.stay_id != stay_id {
            self.close_segment();
            self.stay_id = stay_id;
        }
    }

    pub fn stay_id(&self) -> Option<&str> {
        self.stay_id.as_deref()
    }

    /// Appends a closed segment of `duration_minutes` at `rate_per_minute`.
    ///
    /// No-op for non-positive durations. Returns `(energy, fee)` when recorded.
    pub fn record_segment(
        &mut self,
        start_secs: f64,
        duration_minutes: f64,
        fan_speed: FanSpeed,
        rate_per_minute: f64,
    ) -> Option<(f64, f64)> {
        if duration_minutes <= 0.0 {
            return None;
        }
        let (energy, fee) = self.charge(duration_minutes, rate_per_minute);
        self.segments.push(Segment {
            stay_id: self.stay_id.clone(),
            start_secs,
            duration_minutes,
            fan_speed,
            energy,
            fee,
        });
        self.open = false;
        Some((energy, fee))
    }

    /// Bills `duration_minutes` of continuous service.
    ///
    /// Extends the open tail segment when the fan setting is unchanged,
    /// otherwise opens a new one starting at `start_secs`.
    pub fn accrue(
        &mut self,
        start_secs: f64,
        duration_minutes: f64,
        fan_speed: FanSpeed,
        rate_per_minute: f64,
    ) {
        if duration_minutes <= 0.0 {
            return;
        }
        let extendable = self.open
            && self
                .segments
                .last()
                .is_some_and(|s| s.fan_speed == fan_speed);
        if !extendable {
            self.record_segment(start_secs, duration_minutes, fan_speed, rate_per_minute);
            self.open = true;
            return;
        }

        let (energy, fee) = self.charge(duration_minutes, rate_per_minute);
        if let Some(tail) = self.segments.last_mut() {
            tail.duration_minutes += duration_minutes;
            tail.energy += energy;
            tail.fee += fee;
        }
    }

    /// Ends the current segment; the next accrual starts a new one.
    pub fn close_segment(&mut self) {
        self.open = false;
    }

    fn charge(&mut self, duration_minutes: f64, rate_per_minute: f64) -> (f64, f64) {
        let energy = rate_per_minute * duration_minutes;
        let fee = energy * self.unit_price;
        self.total_energy += energy;
        self.total_fee += fee;
        (energy, fee)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn total_energy(&self) -> f64 {
        self.total_energy
    }

    pub fn total_fee(&self) -> f64 {
        self.total_fee
    }

    /// Produces a finalized bill, rounded for presentation.
    pub fn bill(&self, room_id: &RoomId) -> Bill {
        Bill {
            room_id: room_id.clone(),
            stay_id: self.stay_id.clone(),
            total_energy: round_dp(self.total_energy, 4),
            total_fee: round_dp(self.total_fee, 2),
            segments: self
                .segments
                .iter()
                .map(|s| Segment {
                    stay_id: s.stay_id.clone(),
                    start_secs: round_dp(s.start_secs, 1),
                    duration_minutes: round_dp(s.duration_minutes, 2),
                    fan_speed: s.fan_speed,
                    energy: round_dp(s.energy, 4),
                    fee: round_dp(s.fee, 2),
                })
                .collect(),
        }
    }
}

/// Finalized AC usage bill for one room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bill {
    pub room_id: RoomId,
    pub stay_id: Option<String>,
    pub total_energy: f64,
    pub total_fee: f64,
    pub segments: Vec<Segment>,
}
