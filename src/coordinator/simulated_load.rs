//! `SimulateLoad(count)`: the demo-mode cooldown bypass. Split out
//! of `mod.rs` because it is the one operation that drives the tick loop
//! itself rather than being driven by it.

use super::{Coordinator, TickResult};
use crate::models::TaskType;

/// Enqueues `count` synthetic analyze items round-robining across known
/// services (falling back to a placeholder service if none are registered
/// yet), zeroes the cooldown before each tick, and runs up to `min(count, 4)`
/// ticks so a single demo call visibly moves the replica table.
pub fn run(coordinator: &Coordinator, count: usize) -> Vec<TickResult> {
    if count == 0 {
        return Vec::new();
    }
    let services = coordinator.known_services();
    let fallback = "demo-service".to_string();
    for i in 0..count {
        let service = if services.is_empty() { &fallback } else { &services[i % services.len()] };
        coordinator.enqueue(service, TaskType::Analyze, 0);
    }

    let ticks = count.min(4);
    let mut results = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        coordinator.zero_cooldown();
        results.push(coordinator.tick());
    }
    results
}
