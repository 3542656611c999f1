use super::ledger::{Bill, Ledger};
use super::types::{FanSpeed, Mode, RoomId, RoomState, Stamp};
use crate::sim::types::{PhysicsParams, RoomSnapshot, Tariff, round_dp};

/// Tolerance on the hysteresis comparison: a drift this close to the margin
/// counts as reaching it.
const HYSTERESIS_EPSILON: f64 = 1e-9;

/// A lifecycle change produced by advancing a room's physics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A running room reached its target and is now stopped. The scheduler
    /// must release it from service.
    ReachedTarget,
    /// A stopped room drifted past the hysteresis margin and wants service.
    RestartRequested,
}

/// One HVAC-served room: setpoint, temperature, lifecycle state, and ledger.
///
/// Queue membership is owned by the scheduler. The unit only records the
/// timestamps the scheduler hands it, so `state == Running` holds exactly
/// while the scheduler lists the room as in service.
#[derive(Debug, Clone)]
pub struct RoomUnit {
    id: RoomId,
    initial_temp: f64,
    current_temp: f64,
    target_temp: f64,
    fan_speed: FanSpeed,
    mode: Mode,
    state: RoomState,
    wait_since: Option<Stamp>,
    serving_since: Option<Stamp>,
    restart_requested: bool,
    /// Simulated seconds spent running, across all service windows.
    service_secs: f64,
    ledger: Ledger,
}

impl RoomUnit {
    /// Creates an idle unit resting at `initial_temp`.
    pub fn new(id: RoomId, initial_temp: f64, unit_price: f64) -> Self {
        Self {
            id,
            initial_temp,
            current_temp: initial_temp,
            target_temp: initial_temp,
            fan_speed: FanSpeed::Medium,
            mode: Mode::Cool,
            state: RoomState::Off,
            wait_since: None,
            serving_since: None,
            restart_requested: false,
            service_secs: 0.0,
            ledger: Ledger::new(unit_price),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn fan_speed(&self) -> FanSpeed {
        self.fan_speed
    }

    /// Scheduling priority, derived from the fan setting.
    pub fn priority(&self) -> u8 {
        self.fan_speed.priority()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current_temp(&self) -> f64 {
        self.current_temp
    }

    pub fn target_temp(&self) -> f64 {
        self.target_temp
    }

    pub fn wait_since(&self) -> Option<Stamp> {
        self.wait_since
    }

    pub fn serving_since(&self) -> Option<Stamp> {
        self.serving_since
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn service_secs(&self) -> f64 {
        self.service_secs
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Applies new setpoint parameters.
    ///
    /// Clears the restart guard; the caller must follow up with a service
    /// request so the room re-queues under its new priority.
    pub fn apply_control(
        &mut self,
        target_temp: f64,
        fan_speed: FanSpeed,
        mode: Mode,
        stay_id: Option<String>,
    ) {
        self.target_temp = target_temp;
        self.fan_speed = fan_speed;
        self.mode = mode;
        self.restart_requested = false;
        if stay_id.is_some() {
            self.ledger.set_stay_id(stay_id);
        }
    }

    /// Moves the unit into `waiting` with a fresh wait window.
    pub fn enter_waiting(&mut self, stamp: Stamp) {
        if self.state == RoomState::Running {
            self.ledger.close_segment();
        }
        self.state = RoomState::Waiting;
        self.wait_since = Some(stamp);
        self.serving_since = None;
    }

    /// Moves the unit into `running`; clears the restart guard.
    pub fn begin_service(&mut self, stamp: Stamp) {
        self.state = RoomState::Running;
        self.serving_since = Some(stamp);
        self.wait_since = None;
        self.restart_requested = false;
    }

    /// Powers the unit off from any state, clearing timers and the restart guard.
    pub fn power_off(&mut self) {
        self.ledger.close_segment();
        self.state = RoomState::Off;
        self.wait_since = None;
        self.serving_since = None;
        self.restart_requested = false;
    }

    /// Advances physics by one step of `step_secs` simulated seconds that
    /// began at `start_secs`.
    ///
    /// Running rooms move toward target and bill the minutes actually spent
    /// moving. All other rooms drift back toward their rest temperature.
    pub fn advance(
        &mut self,
        start_secs: f64,
        step_secs: f64,
        physics: &PhysicsParams,
        tariff: &Tariff,
    ) -> Option<Transition> {
        if step_secs <= 0.0 {
            return None;
        }
        match self.state {
            RoomState::Running => self.run_toward_target(start_secs, step_secs, physics, tariff),
            RoomState::Stopped | RoomState::Waiting | RoomState::Off => {
                self.drift(step_secs, physics)
            }
        }
    }

    fn run_toward_target(
        &mut self,
        start_secs: f64,
        step_secs: f64,
        physics: &PhysicsParams,
        tariff: &Tariff,
    ) -> Option<Transition> {
        if self.mode.reached(self.current_temp, self.target_temp) {
            self.stop_at_target();
            return Some(Transition::ReachedTarget);
        }

        let rate = physics.rate_per_min(self.fan_speed);
        let step_minutes = step_secs / 60.0;
        let remaining = (self.target_temp - self.current_temp).abs();
        let reachable = rate * step_minutes;

        let (used_minutes, reached) = if rate > 0.0 && reachable >= remaining {
            (remaining / rate, true)
        } else {
            (step_minutes, false)
        };

        if reached {
            self.current_temp = self.target_temp;
        } else {
            let direction = match self.mode {
                Mode::Cool => -1.0,
                Mode::Heat => 1.0,
            };
            self.current_temp += direction * reachable;
        }

        self.service_secs += used_minutes * 60.0;
        self.ledger.accrue(
            start_secs,
            used_minutes,
            self.fan_speed,
            tariff.energy_rate(self.fan_speed),
        );

        if reached {
            self.stop_at_target();
            Some(Transition::ReachedTarget)
        } else {
            None
        }
    }

    fn stop_at_target(&mut self) {
        self.ledger.close_segment();
        self.state = RoomState::Stopped;
        self.serving_since = None;
        self.wait_since = None;
    }

    /// Moves an idle room toward its rest temperature, never past it.
    ///
    /// A stopped room asks for service once it sits at least `hysteresis`
    /// past its target, within `HYSTERESIS_EPSILON`. A rest temperature
    /// closer than `hysteresis - HYSTERESIS_EPSILON` never triggers it.
    fn drift(&mut self, step_secs: f64, physics: &PhysicsParams) -> Option<Transition> {
        let delta = physics.recovery_rate_per_min * step_secs / 60.0;
        let gap = self.initial_temp - self.current_temp;
        if gap.abs() <= delta {
            self.current_temp = self.initial_temp;
        } else {
            self.current_temp += delta.copysign(gap);
        }

        let drifted = self.mode.drift_past(self.current_temp, self.target_temp);
        if self.state == RoomState::Stopped
            && !self.restart_requested
            && drifted >= physics.hysteresis - HYSTERESIS_EPSILON
        {
            self.restart_requested = true;
            return Some(Transition::RestartRequested);
        }
        None
    }

    /// Rounded, externally visible snapshot at simulated time `now_secs`.
    pub fn snapshot(&self, now_secs: f64) -> RoomSnapshot {
        let since = |stamp: Option<Stamp>| stamp.map_or(0.0, |s| (now_secs - s.secs).max(0.0));
        RoomSnapshot {
            room_id: self.id.clone(),
            stay_id: self.ledger.stay_id().map(str::to_string),
            current_temp: round_dp(self.current_temp, 2),
            initial_temp: round_dp(self.initial_temp, 2),
            target_temp: round_dp(self.target_temp, 2),
            fan_speed: self.fan_speed,
            mode: self.mode,
            state: self.state,
            fee: round_dp(self.ledger.total_fee(), 2),
            energy: round_dp(self.ledger.total_energy(), 4),
            service_secs: round_dp(self.service_secs, 1),
            wait_secs: round_dp(since(self.wait_since), 1),
            served_secs: round_dp(since(self.serving_since), 1),
        }
    }

    pub fn bill(&self) -> Bill {
        self.ledger.bill(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_unit(initial: f64, target: f64, fan: FanSpeed, mode: Mode) -> RoomUnit {
        let mut unit = RoomUnit::new(RoomId::from("101"), initial, 1.0);
        unit.apply_control(target, fan, mode, None);
        unit.enter_waiting(Stamp::new(0.0, 1));
        unit.begin_service(Stamp::new(0.0, 2));
        unit
    }

    fn step(unit: &mut RoomUnit, n: usize) -> Vec<Option<Transition>> {
        let physics = PhysicsParams::default();
        let tariff = Tariff::default();
        (0..n)
            .map(|i| unit.advance(i as f64 * 6.0, 6.0, &physics, &tariff))
            .collect()
    }

    #[test]
    fn new_unit_rests_off() {
        let unit = RoomUnit::new(RoomId::from("101"), 28.0, 1.0);
        assert_eq!(unit.state(), RoomState::Off);
        assert_eq!(unit.current_temp(), 28.0);
        assert!(unit.wait_since().is_none());
    }

    #[test]
    fn one_minute_at_high_bills_rate() {
        let mut unit = running_unit(30.0, 18.0, FanSpeed::High, Mode::Cool);
        let transitions = step(&mut unit, 10);
        assert!(transitions.iter().all(Option::is_none));
        assert!((unit.ledger().total_energy() - 1.0).abs() < 1e-9);
        assert!((unit.ledger().total_fee() - 1.0).abs() < 1e-9);
        assert!((unit.current_temp() - 29.0).abs() < 1e-9);
        assert!((unit.service_secs() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn fan_multiplier_scales_rate() {
        let mut low = running_unit(30.0, 18.0, FanSpeed::Low, Mode::Cool);
        let mut medium = running_unit(30.0, 18.0, FanSpeed::Medium, Mode::Cool);
        step(&mut low, 10);
        step(&mut medium, 10);
        assert!((30.0 - low.current_temp() - 1.0 / 3.0).abs() < 1e-9);
        assert!((30.0 - medium.current_temp() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reaching_target_clamps_stops_and_bills_fraction() {
        // medium: 0.05 degrees per 6s step; 0.12 degrees needs 2.4 steps
        let mut unit = running_unit(25.12, 25.0, FanSpeed::Medium, Mode::Cool);
        let transitions = step(&mut unit, 3);
        assert_eq!(transitions[2], Some(Transition::ReachedTarget));
        assert_eq!(unit.state(), RoomState::Stopped);
        assert_eq!(unit.current_temp(), 25.0);
        assert!(unit.serving_since().is_none());
        // 0.24 minutes at medium rate 0.5
        assert!((unit.ledger().total_energy() - 0.12).abs() < 1e-9);
    }

    #[test]
    fn already_at_target_stops_without_billing() {
        let mut unit = running_unit(24.0, 25.0, FanSpeed::High, Mode::Cool);
        assert_eq!(step(&mut unit, 1)[0], Some(Transition::ReachedTarget));
        assert_eq!(unit.ledger().total_energy(), 0.0);
        assert!(unit.ledger().segments().is_empty());
    }

    #[test]
    fn heating_moves_upward() {
        let mut unit = running_unit(10.0, 22.0, FanSpeed::High, Mode::Heat);
        step(&mut unit, 10);
        assert!((unit.current_temp() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn drift_never_overshoots_rest_temperature() {
        let mut unit = RoomUnit::new(RoomId::from("101"), 26.0, 1.0);
        unit.current_temp = 25.98;
        step(&mut unit, 1);
        assert_eq!(unit.current_temp(), 26.0);
        step(&mut unit, 5);
        assert_eq!(unit.current_temp(), 26.0);
    }

    #[test]
    fn hysteresis_restart_fires_exactly_at_margin() {
        // stopped at 25 with rest temperature 27; drift 0.05 per step
        let mut unit = running_unit(25.0, 25.0, FanSpeed::Medium, Mode::Cool);
        unit.initial_temp = 27.0;
        assert_eq!(step(&mut unit, 1)[0], Some(Transition::ReachedTarget));

        let transitions = step(&mut unit, 20);
        let fired: Vec<usize> = transitions
            .iter()
            .enumerate()
            .filter_map(|(i, t)| (*t == Some(Transition::RestartRequested)).then_some(i))
            .collect();
        assert_eq!(fired, vec![19]);
        assert!((unit.current_temp() - 26.0).abs() < 1e-9);
        assert!(unit.restart_requested());
    }

    #[test]
    fn hysteresis_tolerance_boundary() {
        let settle = |rest: f64| {
            let mut unit = running_unit(25.0, 25.0, FanSpeed::Medium, Mode::Cool);
            step(&mut unit, 1);
            unit.initial_temp = rest;
            unit.current_temp = rest;
            step(&mut unit, 5)
        };

        let within = settle(26.0 - 5e-10);
        assert_eq!(within[0], Some(Transition::RestartRequested));

        let short = settle(26.0 - 1e-6);
        assert!(short.iter().all(Option::is_none));
    }

    #[test]
    fn restart_guard_blocks_duplicates() {
        let mut unit = running_unit(25.0, 25.0, FanSpeed::Medium, Mode::Cool);
        unit.initial_temp = 28.0;
        step(&mut unit, 1);
        let transitions = step(&mut unit, 40);
        let restarts = transitions
            .iter()
            .filter(|t| **t == Some(Transition::RestartRequested))
            .count();
        assert_eq!(restarts, 1);
    }

    #[test]
    fn power_off_clears_timers_and_guard() {
        let mut unit = running_unit(30.0, 20.0, FanSpeed::Low, Mode::Cool);
        unit.restart_requested = true;
        unit.power_off();
        assert_eq!(unit.state(), RoomState::Off);
        assert!(unit.wait_since().is_none());
        assert!(unit.serving_since().is_none());
        assert!(!unit.restart_requested());
    }

    #[test]
    fn snapshot_rounds_at_boundary() {
        let mut unit = running_unit(30.0, 18.0, FanSpeed::Low, Mode::Cool);
        step(&mut unit, 1);
        let snap = unit.snapshot(6.0);
        assert_eq!(snap.current_temp, 29.97);
        assert_eq!(snap.served_secs, 6.0);
        assert_eq!(snap.fee, 0.03);
        assert!(unit.current_temp() != snap.current_temp);
    }
}
