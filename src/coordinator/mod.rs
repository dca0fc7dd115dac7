//! Cluster Coordinator: a process-singleton MAPE-K control loop
//! owning the replica table, work queue, partitioning scheme, and scale
//! history. Grounded in `cluster/coordinator.py`.

mod simulated_load;

use crate::config::ClusterConfig;
use crate::models::{
    AgentReplica, ReplicaStatus, ScaleEvent, ScaleEventKind, TaskType, WorkItem, WorkStatus,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const PRIMARY_REPLICA_NAME: &str = "forge-primary";
const COMPLETED_RING_CAP: usize = 50;
const VALIDATION_RING_CAP: usize = 20;

/// `(cpu_load, memory_mb)` from `len(assigned_services)/MAX_SERVICES_PER_AGENT`,
/// whether the replica has a current task, and small bounded noise.
/// Deliberately synthetic; never fed by real sampling.
fn simulate_load(assigned: usize, max_per_agent: usize, has_task: bool, noise_seed: u64) -> (f64, f64) {
    // A cheap deterministic "noise" derived from the seed rather than a real
    // RNG dependency -- keeps tick() synchronous and allocation-free.
    let noise_unit = ((noise_seed.wrapping_mul(2654435761) >> 20) % 1000) as f64 / 1000.0; // [0,1)
    let cpu = 30.0 + 50.0 * (assigned as f64 / max_per_agent.max(1) as f64)
        + if has_task { 15.0 } else { 0.0 }
        + (noise_unit - 0.5) * 14.0; // +/- 7
    let mem = 256.0 + 180.0 * assigned as f64 + if has_task { 120.0 } else { 0.0 } + (noise_unit - 0.5) * 60.0; // +/- 30
    (cpu.clamp(0.0, 100.0), mem.clamp(128.0, 4096.0))
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitorSnapshot {
    pub queue_depth: usize,
    pub replica_count: usize,
    pub services_per_agent: usize,
    pub avg_cpu: f64,
    pub avg_memory_mb: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TickResult {
    pub monitor: MonitorSnapshot,
    pub scale_event: Option<ScaleEvent>,
}

struct Inner {
    replicas: HashMap<String, AgentReplica>,
    queue: VecDeque<WorkItem>,
    completed: VecDeque<WorkItem>,
    scale_events: Vec<ScaleEvent>,
    pending_validation: Option<(String, String)>,
    validation_ring: VecDeque<crate::adapters::validation::NetworkValidationResult>,
    known_services: Vec<String>,
    last_scale_time: DateTime<Utc>,
    tick_counter: u64,
}

pub struct Coordinator {
    inner: Mutex<Inner>,
    config: ClusterConfig,
}

impl Coordinator {
    /// Constructed once at startup; `forge-primary` is present from
    /// construction and is never a scale-down victim.
    pub fn new(config: ClusterConfig) -> Self {
        let now = Utc::now();
        let mut replicas = HashMap::new();
        replicas.insert(
            "repl-primary".to_string(),
            AgentReplica {
                replica_id: "repl-primary".to_string(),
                name: PRIMARY_REPLICA_NAME.to_string(),
                status: ReplicaStatus::Running,
                assigned_services: Vec::new(),
                analyses_completed: 0,
                current_task: None,
                spawned_at: now,
                last_heartbeat: now,
                cpu_load: 30.0,
                memory_mb: 256.0,
            },
        );
        Self {
            inner: Mutex::new(Inner {
                replicas,
                queue: VecDeque::new(),
                completed: VecDeque::new(),
                scale_events: Vec::new(),
                pending_validation: None,
                validation_ring: VecDeque::new(),
                known_services: Vec::new(),
                last_scale_time: now - chrono::Duration::seconds(config.scale_cooldown_secs as i64 + 1),
                tick_counter: 0,
            }),
            config,
        }
    }

    pub fn register_service(&self, name: &str) {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        if !inner.known_services.iter().any(|s| s == name) {
            inner.known_services.push(name.to_string());
            Self::rebalance_partitions(&mut inner);
        }
    }

    pub fn enqueue(&self, service_name: &str, task_type: TaskType, priority: i32) -> WorkItem {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        let item = WorkItem {
            id: format!("wi-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            service_name: service_name.to_string(),
            task_type,
            priority,
            enqueued_at: Utc::now(),
            assigned_to: None,
            status: WorkStatus::Pending,
        };
        inner.queue.push_back(item.clone());
        item
    }

    /// One MAPE-K tick, atomic under the coordinator lock. Purely
    /// CPU-bound: never awaits an external call -- the post-scale
    /// validation hand-off is a separate, decoupled step
    /// ([`Coordinator::take_pending_validation`]).
    pub fn tick(&self) -> TickResult {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        inner.tick_counter += 1;
        let tick_seed = inner.tick_counter;

        // --- Monitor ---
        let max_per_agent = self.config.max_services_per_agent;
        let now = Utc::now();
        for (idx, replica) in inner.replicas.values_mut().enumerate() {
            if replica.status != ReplicaStatus::Running {
                continue;
            }
            let (cpu, mem) = simulate_load(
                replica.assigned_services.len(),
                max_per_agent,
                replica.current_task.is_some(),
                tick_seed.wrapping_add(idx as u64),
            );
            replica.cpu_load = cpu;
            replica.memory_mb = mem;
            replica.last_heartbeat = now;
        }

        let running: Vec<&AgentReplica> = inner.replicas.values().filter(|r| r.status == ReplicaStatus::Running).collect();
        let replica_count = running.len();
        let queue_depth = inner.queue.iter().filter(|w| w.status == WorkStatus::Pending).count();
        let services_per_agent = if replica_count == 0 { 0 } else { inner.known_services.len().div_ceil(replica_count) };
        let avg_cpu = if replica_count == 0 { 0.0 } else { running.iter().map(|r| r.cpu_load).sum::<f64>() / replica_count as f64 };
        let avg_memory_mb =
            if replica_count == 0 { 0.0 } else { running.iter().map(|r| r.memory_mb).sum::<f64>() / replica_count as f64 };
        let monitor = MonitorSnapshot { queue_depth, replica_count, services_per_agent, avg_cpu, avg_memory_mb };

        // --- Analyze + Plan + Execute ---
        let cooldown_elapsed = (now - inner.last_scale_time).num_seconds() > self.config.scale_cooldown_secs as i64;
        let mut scale_event = None;
        if cooldown_elapsed {
            if (queue_depth > self.config.queue_high_watermark
                || services_per_agent > self.config.max_services_per_agent
                || avg_cpu > 80.0)
                && replica_count < self.config.max_replicas
            {
                let reason = if queue_depth > self.config.queue_high_watermark {
                    format!("queue_depth {queue_depth} exceeded watermark {}", self.config.queue_high_watermark)
                } else if services_per_agent > self.config.max_services_per_agent {
                    format!("services_per_agent {services_per_agent} exceeded max {}", self.config.max_services_per_agent)
                } else {
                    format!("avg_cpu {avg_cpu:.1}% exceeded 80%")
                };
                scale_event = Some(Self::spawn_replica(&mut inner, &reason));
            } else if queue_depth < self.config.queue_low_watermark && replica_count > self.config.min_replicas {
                let victim = running
                    .iter()
                    .filter(|r| r.name != PRIMARY_REPLICA_NAME)
                    .min_by_key(|r| r.assigned_services.len())
                    .map(|r| r.replica_id.clone());
                if let Some(victim_id) = victim {
                    let reason = format!("queue_depth {queue_depth} below low watermark {}", self.config.queue_low_watermark);
                    scale_event = Some(Self::kill_replica(&mut inner, &victim_id, &reason));
                }
            }
        }
        if scale_event.is_some() {
            inner.last_scale_time = now;
        }

        Self::rebalance_partitions(&mut inner);
        Self::dispatch_work(&mut inner);

        TickResult { monitor, scale_event }
    }

    fn spawn_replica(inner: &mut Inner, reason: &str) -> ScaleEvent {
        let replica_id = format!("repl-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let n = inner.replicas.len();
        let name = format!("forge-replica-{n}");
        let now = Utc::now();
        inner.replicas.insert(
            replica_id.clone(),
            AgentReplica {
                replica_id: replica_id.clone(),
                name: name.clone(),
                status: ReplicaStatus::Running,
                assigned_services: Vec::new(),
                analyses_completed: 0,
                current_task: None,
                spawned_at: now,
                last_heartbeat: now,
                cpu_load: 30.0,
                memory_mb: 256.0,
            },
        );
        inner.pending_validation = Some(("scale_up".to_string(), name.clone()));
        let event = ScaleEvent {
            event: ScaleEventKind::Spawn,
            replica_id,
            name,
            timestamp: now,
            reason: reason.to_string(),
            total_replicas: inner.replicas.values().filter(|r| r.status == ReplicaStatus::Running).count(),
        };
        inner.scale_events.push(event.clone());
        event
    }

    fn kill_replica(inner: &mut Inner, victim_id: &str, reason: &str) -> ScaleEvent {
        // Reassign in-flight work back to pending before removing the replica.
        for item in inner.queue.iter_mut() {
            if item.assigned_to.as_deref() == Some(victim_id) {
                item.assigned_to = None;
                item.status = WorkStatus::Pending;
            }
        }
        let (name, now) = {
            let replica = inner.replicas.get(victim_id).expect("victim replica must exist");
            (replica.name.clone(), Utc::now())
        };
        inner.pending_validation = Some(("scale_down".to_string(), name.clone()));
        inner.replicas.remove(victim_id);
        let event = ScaleEvent {
            event: ScaleEventKind::Kill,
            replica_id: victim_id.to_string(),
            name,
            timestamp: now,
            reason: reason.to_string(),
            total_replicas: inner.replicas.values().filter(|r| r.status == ReplicaStatus::Running).count(),
        };
        inner.scale_events.push(event.clone());
        event
    }

    /// Round-robin assign `known_services` across running replicas so every
    /// service appears in exactly one replica's assignment and the spread
    /// between any two replicas' counts is at most 1 (invariant 4).
    fn rebalance_partitions(inner: &mut Inner) {
        let mut ids: Vec<String> =
            inner.replicas.values().filter(|r| r.status == ReplicaStatus::Running).map(|r| r.replica_id.clone()).collect();
        ids.sort();
        for replica in inner.replicas.values_mut() {
            replica.assigned_services.clear();
        }
        if ids.is_empty() {
            return;
        }
        for (i, service) in inner.known_services.iter().enumerate() {
            let replica_id = &ids[i % ids.len()];
            if let Some(replica) = inner.replicas.get_mut(replica_id) {
                replica.assigned_services.push(service.clone());
            }
        }
    }

    /// For each running, idle replica, pull the earliest pending work item.
    fn dispatch_work(inner: &mut Inner) {
        let idle_ids: Vec<String> = inner
            .replicas
            .values()
            .filter(|r| r.status == ReplicaStatus::Running && r.current_task.is_none())
            .map(|r| r.replica_id.clone())
            .collect();
        for replica_id in idle_ids {
            if let Some(item) = inner.queue.iter_mut().find(|w| w.status == WorkStatus::Pending) {
                item.status = WorkStatus::Processing;
                item.assigned_to = Some(replica_id.clone());
                let task_label = format!("{}:{}", item.task_type.as_str(), item.service_name);
                if let Some(replica) = inner.replicas.get_mut(&replica_id) {
                    replica.current_task = Some(task_label);
                }
            }
        }
    }

    /// `CompleteWork(id, success)`: transitions `processing -> completed|failed`
    /// exactly once and increments the assigned replica's `analyses_completed`.
    pub fn complete_work(&self, id: &str, success: bool) -> bool {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        let Some(pos) = inner.queue.iter().position(|w| w.id == id && w.status == WorkStatus::Processing) else {
            return false;
        };
        let mut item = inner.queue.remove(pos).expect("position just found");
        item.status = if success { WorkStatus::Completed } else { WorkStatus::Failed };
        if let Some(replica_id) = item.assigned_to.clone() {
            if let Some(replica) = inner.replicas.get_mut(&replica_id) {
                replica.current_task = None;
                replica.analyses_completed += 1;
            }
        }
        inner.completed.push_back(item);
        if inner.completed.len() > COMPLETED_RING_CAP {
            inner.completed.pop_front();
        }
        true
    }

    /// Manual scale (`/api/cluster/scale`). Operator intent bypasses the
    /// cooldown (an explicit ask is not automation runaway) but the
    /// MIN/MAX replica bounds and primary protection still apply.
    pub fn scale(&self, direction: &str, reason: &str) -> Result<ScaleEvent, String> {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        let replica_count = inner.replicas.values().filter(|r| r.status == ReplicaStatus::Running).count();
        let event = match direction {
            "up" => {
                if replica_count >= self.config.max_replicas {
                    return Err(format!("already at max_replicas ({})", self.config.max_replicas));
                }
                Self::spawn_replica(&mut inner, reason)
            }
            "down" => {
                if replica_count <= self.config.min_replicas {
                    return Err(format!("already at min_replicas ({})", self.config.min_replicas));
                }
                let victim = inner
                    .replicas
                    .values()
                    .filter(|r| r.status == ReplicaStatus::Running && r.name != PRIMARY_REPLICA_NAME)
                    .min_by_key(|r| r.assigned_services.len())
                    .map(|r| r.replica_id.clone())
                    .ok_or_else(|| "no eligible scale-down victim".to_string())?;
                Self::kill_replica(&mut inner, &victim, reason)
            }
            other => return Err(format!("unknown scale direction: {other}")),
        };
        inner.last_scale_time = Utc::now();
        Self::rebalance_partitions(&mut inner);
        Ok(event)
    }

    /// Post-scale validation hand-off: decoupled from the tick so
    /// the tick itself never awaits an external call.
    pub fn take_pending_validation(&self) -> Option<(String, String)> {
        self.inner.lock().expect("coordinator mutex poisoned").pending_validation.take()
    }

    pub fn push_validation_result(&self, result: crate::adapters::validation::NetworkValidationResult) {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        inner.validation_ring.push_back(result);
        if inner.validation_ring.len() > VALIDATION_RING_CAP {
            inner.validation_ring.pop_front();
        }
    }

    pub fn validations(&self) -> Vec<crate::adapters::validation::NetworkValidationResult> {
        self.inner.lock().expect("coordinator mutex poisoned").validation_ring.iter().cloned().collect()
    }

    pub fn known_services(&self) -> Vec<String> {
        self.inner.lock().expect("coordinator mutex poisoned").known_services.clone()
    }

    pub fn scale_events(&self) -> Vec<ScaleEvent> {
        self.inner.lock().expect("coordinator mutex poisoned").scale_events.clone()
    }

    pub fn replicas(&self) -> Vec<AgentReplica> {
        self.inner.lock().expect("coordinator mutex poisoned").replicas.values().cloned().collect()
    }

    pub fn status(&self) -> serde_json::Value {
        let inner = self.inner.lock().expect("coordinator mutex poisoned");
        let replicas: Vec<&AgentReplica> = inner.replicas.values().collect();
        serde_json::json!({
            "replicas": replicas,
            "queue_depth": inner.queue.iter().filter(|w| w.status == WorkStatus::Pending).count(),
            "queue_processing": inner.queue.iter().filter(|w| w.status == WorkStatus::Processing).count(),
            "completed_recent": inner.completed.iter().rev().cloned().collect::<Vec<_>>(),
            "scale_events": inner.scale_events,
            "known_services": inner.known_services,
            "config": {
                "max_services_per_agent": self.config.max_services_per_agent,
                "queue_high_watermark": self.config.queue_high_watermark,
                "queue_low_watermark": self.config.queue_low_watermark,
                "max_replicas": self.config.max_replicas,
                "min_replicas": self.config.min_replicas,
                "scale_cooldown_secs": self.config.scale_cooldown_secs,
            },
        })
    }

    /// `SimulateLoad(count)` demo-bypass: enqueues `count` synthetic
    /// items round-robining across known services, zeros `last_scale_time`
    /// between ticks, and runs up to `min(count, 4)` ticks.
    pub fn simulate_load(&self, count: usize) -> Vec<TickResult> {
        simulated_load::run(self, count)
    }

    pub(crate) fn zero_cooldown(&self) {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        inner.last_scale_time = Utc::now() - chrono::Duration::seconds(self.config.scale_cooldown_secs as i64 + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_coordinator() -> Coordinator {
        Coordinator::new(ClusterConfig {
            max_services_per_agent: 5,
            queue_high_watermark: 3,
            queue_low_watermark: 1,
            max_replicas: 6,
            min_replicas: 1,
            scale_cooldown_secs: 15,
        })
    }

    #[test]
    fn replica_count_never_leaves_bounds() {
        let c = test_coordinator();
        for _ in 0..20 {
            c.zero_cooldown();
            c.tick();
            let count = c.replicas().iter().filter(|r| r.status == ReplicaStatus::Running).count();
            assert!((1..=6).contains(&count));
        }
    }

    #[test]
    fn cooldown_boundary_does_not_permit_scaling() {
        let c = test_coordinator();
        for i in 0..10 {
            c.enqueue(&format!("svc-{i}"), TaskType::Analyze, 0);
            c.register_service(&format!("svc-{i}"));
        }
        // last_scale_time defaults to just past cooldown already elapsed at
        // construction; force it to exactly the boundary.
        {
            let mut inner = c.inner.lock().unwrap();
            inner.last_scale_time = Utc::now() - chrono::Duration::seconds(15);
        }
        let result = c.tick();
        assert!(result.scale_event.is_none());
    }

    #[test]
    fn rebalance_spreads_services_within_one() {
        let c = test_coordinator();
        for i in 0..7 {
            c.register_service(&format!("svc-{i}"));
        }
        c.zero_cooldown();
        c.tick();
        let replicas = c.replicas();
        let counts: Vec<usize> = replicas.iter().map(|r| r.assigned_services.len()).collect();
        let min = *counts.iter().min().unwrap();
        let max = *counts.iter().max().unwrap();
        assert!(max - min <= 1);
        let mut all: Vec<String> = replicas.iter().flat_map(|r| r.assigned_services.clone()).collect();
        all.sort();
        assert_eq!(all.len(), 7);
    }

    #[test]
    fn complete_work_transitions_exactly_once() {
        let c = test_coordinator();
        c.register_service("svc-a");
        let item = c.enqueue("svc-a", TaskType::Analyze, 0);
        c.zero_cooldown();
        c.tick();
        assert!(c.complete_work(&item.id, true));
        assert!(!c.complete_work(&item.id, true));
    }

    #[test]
    fn simulate_load_zero_causes_no_state_change() {
        let c = test_coordinator();
        let before = c.replicas().len();
        let events = c.simulate_load(0);
        assert!(events.is_empty());
        assert_eq!(c.replicas().len(), before);
    }
}
