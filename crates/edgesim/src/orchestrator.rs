//! Offloading decisions.

use std::cell::RefCell;
use std::rc::Rc;

use edgesim_core::{log_debug, log_trace, SimulationContext};

use crate::config::{OrchestratorConfig, OrchestratorScenario};
use crate::mobility::MobilityModel;
use crate::placement::{worst_fit, Candidate, FitStrategy, VmSelector};
use crate::resources::{ResourceModel, VmInfo};
use crate::task::{Task, TaskDescriptor, Tier};

/// Decides where tasks are offloaded to.
pub trait EdgeOrchestrator {
    /// Returns the identifier of the tier the task should be uploaded to,
    /// see [`Tier::device_id`](crate::task::Tier::device_id).
    fn device_to_offload(&mut self, task: &Task) -> u32;

    /// Returns the VM of the given tier the task should run on, or `None` if no VM has enough capacity.
    fn vm_to_offload(&mut self, task: &Task, tier: Tier) -> Option<VmInfo>;
}

/// Chooses the tier by task urgency.
///
/// Critical tasks always stay at the edge, other tasks stay there only if their deadline is tight.
#[derive(Clone, Copy, Debug)]
pub struct TierPolicy {
    pub deadline_threshold: f64,
}

impl TierPolicy {
    pub fn select_tier(&self, descriptor: &TaskDescriptor) -> Tier {
        if descriptor.critical || descriptor.deadline <= self.deadline_threshold {
            Tier::Edge
        } else {
            Tier::Cloud
        }
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            deadline_threshold: 10.,
        }
    }
}

pub struct BasicEdgeOrchestrator {
    selector: VmSelector,
    scenario: OrchestratorScenario,
    tier_policy: TierPolicy,
    resources: Rc<RefCell<dyn ResourceModel>>,
    mobility: Rc<dyn MobilityModel>,
    ctx: SimulationContext,
}

impl BasicEdgeOrchestrator {
    pub fn new(
        config: &OrchestratorConfig,
        resources: Rc<RefCell<dyn ResourceModel>>,
        mobility: Rc<dyn MobilityModel>,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            selector: VmSelector::new(config.policy),
            scenario: config.scenario,
            tier_policy: TierPolicy {
                deadline_threshold: config.deadline_threshold,
            },
            resources,
            mobility,
            ctx,
        }
    }

    pub fn policy(&self) -> FitStrategy {
        self.selector.strategy()
    }

    fn select_cloud_vm(&self, task: &Task) -> Option<VmInfo> {
        let resources = self.resources.borrow();
        let hosts: Vec<Vec<Candidate>> = (0..resources.cloud_host_count())
            .map(|h| candidates_at(task, resources.cloud_vms(h), &*resources, self.ctx.time()))
            .collect();
        let all = hosts.iter().flat_map(|vms| vms.iter().map(|c| (&c.vm, c)));
        worst_fit(all).cloned()
    }

    fn select_edge_vm(&mut self, task: &Task) -> Option<VmInfo> {
        let resources = self.resources.borrow();
        let ctx = &mut self.ctx;
        match self.scenario {
            OrchestratorScenario::TwoTierWithEo => {
                let hosts: Vec<Vec<Candidate>> = (0..resources.edge_host_count())
                    .map(|h| candidates_at(task, resources.edge_vms(h), &*resources, ctx.time()))
                    .collect();
                let (host, vm) = self.selector.select_in_pool(&hosts, |n| ctx.gen_range(0..n))?;
                Some(hosts[host][vm].vm.clone())
            }
            OrchestratorScenario::TwoTier => {
                let location = self.mobility.location(task.mobile_device_id(), ctx.time());
                let Some(host) = resources.edge_host_at(location.serving_access_point) else {
                    log_trace!(
                        ctx,
                        "no edge host at access point {} for task {}",
                        location.serving_access_point,
                        task.id()
                    );
                    return None;
                };
                let candidates = candidates_at(task, resources.edge_vms(host), &*resources, ctx.time());
                let vm = self.selector.select_on_host(host, &candidates, |n| ctx.gen_range(0..n))?;
                Some(candidates[vm].vm.clone())
            }
        }
    }
}

fn candidates_at(task: &Task, vms: &[VmInfo], resources: &dyn ResourceModel, now: f64) -> Vec<Candidate> {
    vms.iter()
        .map(|vm| Candidate {
            vm: vm.clone(),
            required: task.predict_utilization(vm.class),
            available: 100. - resources.utilization(vm.id, now),
        })
        .collect()
}

impl EdgeOrchestrator for BasicEdgeOrchestrator {
    fn device_to_offload(&mut self, task: &Task) -> u32 {
        let tier = self.tier_policy.select_tier(task.descriptor());
        log_trace!(
            self.ctx,
            "task {} (deadline {:.2}, critical {}) goes to {:?}",
            task.id(),
            task.deadline(),
            task.is_critical(),
            tier
        );
        tier.device_id()
    }

    fn vm_to_offload(&mut self, task: &Task, tier: Tier) -> Option<VmInfo> {
        let vm = match tier {
            Tier::Cloud => self.select_cloud_vm(task),
            Tier::Edge => self.select_edge_vm(task),
        };
        match &vm {
            Some(vm) => log_debug!(self.ctx, "selected VM {} on host {} for task {}", vm.id, vm.host_id, task.id()),
            None => log_debug!(self.ctx, "no {:?} VM can run task {}", tier, task.id()),
        }
        vm
    }
}
