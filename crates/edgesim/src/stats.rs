//! Simulation statistics.

use std::collections::{BTreeMap, HashMap};

use crate::network::DelayKind;
use crate::task::{FailureReason, Task, TaskId, Tier};

/// Observer of task lifecycle, never affects the simulation.
pub trait StatsSink {
    fn task_admitted(&mut self, task: &Task, time: f64);
    fn task_started(&mut self, task: &Task, time: f64);
    fn upload_delay_recorded(&mut self, task: &Task, kind: DelayKind, delay: f64);
    fn task_assigned(&mut self, task: &Task, time: f64);
    fn task_executed(&mut self, task: &Task, time: f64);
    fn download_delay_recorded(&mut self, task: &Task, kind: DelayKind, delay: f64);
    fn task_delivered(&mut self, task: &Task, time: f64);
    fn task_failed(&mut self, task: &Task, reason: FailureReason, time: f64);
}

#[derive(Clone, Default, Debug)]
pub struct SampleMetric {
    data: Vec<f64>,
}

impl SampleMetric {
    pub fn add(&mut self, x: f64) {
        self.data.push(x);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Returns zero for an empty sample.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.;
        }
        self.sum() / (self.data.len() as f64)
    }
}

#[derive(Clone, Default, Debug)]
pub struct SimStats {
    pub admitted: u64,
    pub started: u64,
    pub executed: u64,
    pub delivered: u64,
    pub delivered_by_tier: BTreeMap<Tier, u64>,
    pub failures: BTreeMap<FailureReason, u64>,
    pub failures_by_tier: BTreeMap<Tier, u64>,
    /// Time from admission to delivery of the delivered tasks.
    pub service_time: SampleMetric,
    /// Time from VM assignment to execution end.
    pub processing_time: SampleMetric,
    pub upload_delay: BTreeMap<DelayKind, SampleMetric>,
    pub download_delay: BTreeMap<DelayKind, SampleMetric>,
    assigned_at: HashMap<TaskId, f64>,
}

impl SimStats {
    pub fn completed(&self) -> u64 {
        self.delivered
    }

    pub fn failed(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn failed_with(&self, reason: FailureReason) -> u64 {
        self.failures.get(&reason).copied().unwrap_or(0)
    }

    /// Share of failed tasks among the finished ones, in percent.
    pub fn failure_rate(&self) -> f64 {
        let finished = self.completed() + self.failed();
        if finished == 0 {
            return 0.;
        }
        self.failed() as f64 * 100. / finished as f64
    }
}

impl StatsSink for SimStats {
    fn task_admitted(&mut self, _task: &Task, _time: f64) {
        self.admitted += 1;
    }

    fn task_started(&mut self, _task: &Task, _time: f64) {
        self.started += 1;
    }

    fn upload_delay_recorded(&mut self, _task: &Task, kind: DelayKind, delay: f64) {
        self.upload_delay.entry(kind).or_default().add(delay);
    }

    fn task_assigned(&mut self, task: &Task, time: f64) {
        self.assigned_at.insert(task.id(), time);
    }

    fn task_executed(&mut self, task: &Task, time: f64) {
        self.executed += 1;
        if let Some(assigned) = self.assigned_at.remove(&task.id()) {
            self.processing_time.add(time - assigned);
        }
    }

    fn download_delay_recorded(&mut self, _task: &Task, kind: DelayKind, delay: f64) {
        self.download_delay.entry(kind).or_default().add(delay);
    }

    fn task_delivered(&mut self, task: &Task, time: f64) {
        self.delivered += 1;
        if let Some(tier) = task.target() {
            *self.delivered_by_tier.entry(tier).or_default() += 1;
        }
        self.service_time.add(time - task.submission_time());
    }

    fn task_failed(&mut self, task: &Task, reason: FailureReason, _time: f64) {
        *self.failures.entry(reason).or_default() += 1;
        if let Some(tier) = task.target() {
            *self.failures_by_tier.entry(tier).or_default() += 1;
        }
        self.assigned_at.remove(&task.id());
    }
}
