/// Simulated clock with wall-to-simulated time acceleration.
pub mod clock;
pub mod engine;
/// Scripted requests for headless runs.
pub mod event;
pub mod kpi;
/// Capacity-limited admission, preemption, and rotation.
pub mod scheduler;
pub mod types;
