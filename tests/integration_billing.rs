//! Physics, ledger, and hysteresis behavior observed through the engine.

mod common;

use common::{cool, engine, engine_with_rooms, id, run, state, unit};
use hvac_sched::request::ControlRequest;
use hvac_sched::room::{RoomState, StaticDirectory};
use hvac_sched::sim::clock::SimClock;
use hvac_sched::sim::engine::Engine;
use hvac_sched::sim::types::{EngineConfig, PhysicsParams, Tariff};

#[test]
fn one_minute_at_high_bills_the_high_rate() {
    let mut e = engine_with_rooms(1, &[("a", 30.0)]);
    cool(&mut e, "a", 18.0, "high");
    run(&mut e, 10);

    let bill = e.bill(&id("a")).expect("bill");
    assert_eq!(bill.total_energy, 1.0);
    assert_eq!(bill.total_fee, 1.0);
    assert_eq!(bill.segments.len(), 1);
    assert_eq!(bill.segments[0].duration_minutes, 1.0);
}

#[test]
fn fee_scales_with_unit_price() {
    let tariff = Tariff {
        high_rate: 0.8,
        unit_price: 1.5,
        ..Tariff::default()
    };
    let config = EngineConfig::with_params(1, 120.0, PhysicsParams::default(), tariff);
    let mut e = Engine::new(config, SimClock::default(), StaticDirectory::default());
    cool(&mut e, "a", 18.0, "high");
    run(&mut e, 10);

    let bill = e.bill(&id("a")).expect("bill");
    assert_eq!(bill.total_energy, 0.8);
    assert_eq!(bill.total_fee, 1.2);
}

#[test]
fn ledger_total_is_sum_of_segments() {
    let mut e = engine_with_rooms(1, &[("a", 30.0)]);
    for fan in ["medium", "high", "low"] {
        cool(&mut e, "a", 18.0, fan);
        run(&mut e, 10);
    }
    assert!(e.power_off(&id("a")));

    let ledger = unit(&e, "a").ledger();
    assert_eq!(ledger.segments().len(), 3);
    let fee_sum: f64 = ledger.segments().iter().map(|s| s.fee).sum();
    let energy_sum: f64 = ledger.segments().iter().map(|s| s.energy).sum();
    assert!((fee_sum - ledger.total_fee()).abs() < 1e-9);
    assert!((energy_sum - ledger.total_energy()).abs() < 1e-9);
    assert!((ledger.total_fee() - (0.5 + 1.0 + 1.0 / 3.0)).abs() < 1e-9);
}

#[test]
fn partial_step_is_billed_for_the_fraction_used() {
    let mut e = engine(1);
    let mut req = ControlRequest::new(25.95, "high", "cool");
    req.initial_temp = Some(26.0);
    e.submit_control("a", &req).expect("valid");
    e.tick();

    assert_eq!(state(&e, "a"), RoomState::Stopped);
    let bill = e.bill(&id("a")).expect("bill");
    assert_eq!(bill.total_energy, 0.05);
    assert_eq!(unit(&e, "a").current_temp(), 25.95);
}

#[test]
fn stopped_room_rejoins_exactly_at_hysteresis() {
    let mut e = engine_with_rooms(1, &[("a", 27.0), ("b", 30.0)]);
    cool(&mut e, "a", 26.0, "high");
    cool(&mut e, "b", 18.0, "high");

    let records = run(&mut e, 40);
    let stopped_at = records
        .iter()
        .position(|r| r.counts.stopped == 1)
        .expect("a should reach target");
    assert_eq!(records[stopped_at].in_service, vec![id("b")]);

    // One degree of drift at 0.5 per minute takes twenty 6 s ticks.
    for r in &records[stopped_at..stopped_at + 20] {
        assert!(r.waiting.is_empty(), "restart too early at tick {}", r.tick);
    }
    assert_eq!(records[stopped_at + 20].waiting, vec![id("a")]);
    assert_eq!(records[stopped_at + 20].counts.stopped, 0);
}

#[test]
fn drift_never_passes_initial_temperature() {
    let config = EngineConfig::with_params(
        1,
        120.0,
        PhysicsParams {
            hysteresis: 5.0,
            ..PhysicsParams::default()
        },
        Tariff::default(),
    );
    let mut e = Engine::new(config, SimClock::default(), StaticDirectory::default());
    let mut req = ControlRequest::new(26.5, "high", "cool");
    req.initial_temp = Some(27.0);
    e.submit_control("a", &req).expect("valid");

    run(&mut e, 200);
    assert_eq!(state(&e, "a"), RoomState::Stopped);
    assert_eq!(unit(&e, "a").current_temp(), 27.0);
    assert!(!unit(&e, "a").restart_requested());
}

#[test]
fn checkout_returns_final_bill_and_forgets_room() {
    let mut e = engine(2);
    let mut req = ControlRequest::new(20.0, "high", "cool");
    req.stay_id = Some("stay-7".into());
    e.submit_control("a", &req).expect("valid");
    run(&mut e, 10);

    let bill = e.checkout(&id("a")).expect("bill");
    assert_eq!(bill.stay_id.as_deref(), Some("stay-7"));
    assert!(bill.segments.iter().all(|s| s.stay_id.as_deref() == Some("stay-7")));
    assert_eq!(bill.total_fee, 1.0);
    assert!(e.room(&id("a")).is_none());
    assert!(e.checkout(&id("a")).is_none());

    cool(&mut e, "a", 20.0, "high");
    assert_eq!(e.bill(&id("a")).map(|b| b.total_fee), Some(0.0));
}
