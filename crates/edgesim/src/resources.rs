//! Edge and cloud servers hosting VMs.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use edgesim_core::{cast, log_debug, log_error, Event, EventHandler, Id, SimulationContext};

use crate::config::{SimulationConfig, VmGroupConfig};
use crate::events::device::TaskExecuted;
use crate::events::server::{ExecuteTask, VmTaskCompleted};
use crate::task::{TaskId, CLOUD_DATACENTER_ID};

pub type HostId = u32;
pub type VmId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmClass {
    Edge,
    Cloud,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VmInfo {
    pub id: VmId,
    pub host_id: HostId,
    pub datacenter_id: u32,
    pub class: VmClass,
    pub mips: f64,
}

/// Read-only view of hosts and VMs used by the orchestrator.
///
/// Hosts are addressed by their index within a tier, VMs of a host are listed in a fixed order.
pub trait ResourceModel {
    fn edge_host_count(&self) -> usize;

    /// Index of the edge host attached to the access point.
    fn edge_host_at(&self, access_point: u32) -> Option<usize>;

    fn edge_vms(&self, host_index: usize) -> &[VmInfo];

    fn cloud_host_count(&self) -> usize;

    fn cloud_vms(&self, host_index: usize) -> &[VmInfo];

    /// Current CPU utilization of the VM in percent.
    fn utilization(&self, vm_id: VmId, time: f64) -> f64;
}

#[derive(Default)]
struct VmLoad {
    running: BTreeMap<TaskId, f64>,
}

/// Component owning all servers, executes tasks submitted to VMs.
///
/// VM utilization is the sum of utilizations of the tasks running on it. A task occupies its VM for
/// `length / mips` seconds, then the VM reports completion back to the component that submitted the task.
pub struct ServerManager {
    edge_hosts: Vec<Vec<VmInfo>>,
    cloud_hosts: Vec<Vec<VmInfo>>,
    host_by_access_point: HashMap<u32, usize>,
    vms: Vec<VmInfo>,
    loads: Vec<VmLoad>,
    ctx: SimulationContext,
}

impl ServerManager {
    pub fn new(config: &SimulationConfig, ctx: SimulationContext) -> Self {
        let mut manager = Self {
            edge_hosts: Vec::new(),
            cloud_hosts: Vec::new(),
            host_by_access_point: HashMap::new(),
            vms: Vec::new(),
            loads: Vec::new(),
            ctx,
        };
        let mut next_host_id: HostId = 0;
        for (index, host) in config.edge_hosts.iter().enumerate() {
            // each edge host forms its own datacenter
            let vms = manager.create_vms(&host.vms, next_host_id, index as u32, VmClass::Edge);
            manager.edge_hosts.push(vms);
            manager.host_by_access_point.insert(host.access_point, index);
            next_host_id += 1;
        }
        for host in &config.cloud_hosts {
            for _ in 0..host.count {
                let vms = manager.create_vms(&host.vms, next_host_id, CLOUD_DATACENTER_ID, VmClass::Cloud);
                manager.cloud_hosts.push(vms);
                next_host_id += 1;
            }
        }
        log_debug!(
            manager.ctx,
            "created {} edge hosts, {} cloud hosts, {} VMs",
            manager.edge_hosts.len(),
            manager.cloud_hosts.len(),
            manager.vms.len()
        );
        manager
    }

    fn create_vms(&mut self, groups: &[VmGroupConfig], host_id: HostId, datacenter_id: u32, class: VmClass) -> Vec<VmInfo> {
        let mut vms = Vec::new();
        for group in groups {
            for _ in 0..group.count {
                let vm = VmInfo {
                    id: self.vms.len() as VmId,
                    host_id,
                    datacenter_id,
                    class,
                    mips: group.mips,
                };
                self.vms.push(vm.clone());
                self.loads.push(VmLoad::default());
                vms.push(vm);
            }
        }
        vms
    }

    pub fn vm(&self, vm_id: VmId) -> Option<&VmInfo> {
        self.vms.get(vm_id as usize)
    }

    pub fn running_tasks(&self, vm_id: VmId) -> usize {
        self.loads.get(vm_id as usize).map_or(0, |load| load.running.len())
    }

    fn on_execute_task(&mut self, task_id: TaskId, vm_id: VmId, length: u64, utilization: f64, requester: Id) {
        let Some(vm) = self.vms.get(vm_id as usize) else {
            log_error!(self.ctx, "task {} is submitted to unknown VM {}", task_id, vm_id);
            panic!("Task {} is submitted to unknown VM {}", task_id, vm_id);
        };
        let execution_time = length as f64 / vm.mips;
        self.loads[vm_id as usize].running.insert(task_id, utilization);
        log_debug!(
            self.ctx,
            "started task {} on VM {} (utilization {:.2}%, execution time {:.3})",
            task_id,
            vm_id,
            self.utilization(vm_id, self.ctx.time()),
            execution_time
        );
        self.ctx.emit_self(
            VmTaskCompleted {
                task_id,
                vm_id,
                requester,
            },
            execution_time,
        );
    }

    fn on_vm_task_completed(&mut self, task_id: TaskId, vm_id: VmId, requester: Id) {
        self.loads[vm_id as usize].running.remove(&task_id);
        log_debug!(self.ctx, "finished task {} on VM {}", task_id, vm_id);
        self.ctx.emit_now(TaskExecuted { task_id }, requester);
    }
}

impl ResourceModel for ServerManager {
    fn edge_host_count(&self) -> usize {
        self.edge_hosts.len()
    }

    fn edge_host_at(&self, access_point: u32) -> Option<usize> {
        self.host_by_access_point.get(&access_point).copied()
    }

    fn edge_vms(&self, host_index: usize) -> &[VmInfo] {
        &self.edge_hosts[host_index]
    }

    fn cloud_host_count(&self) -> usize {
        self.cloud_hosts.len()
    }

    fn cloud_vms(&self, host_index: usize) -> &[VmInfo] {
        &self.cloud_hosts[host_index]
    }

    fn utilization(&self, vm_id: VmId, _time: f64) -> f64 {
        self.loads
            .get(vm_id as usize)
            .map_or(0., |load| load.running.values().sum())
    }
}

impl EventHandler for ServerManager {
    fn on(&mut self, event: Event) {
        let src = event.src;
        cast!(match event.data {
            ExecuteTask {
                task_id,
                vm_id,
                length,
                utilization,
            } => {
                self.on_execute_task(task_id, vm_id, length, utilization, src);
            }
            VmTaskCompleted {
                task_id,
                vm_id,
                requester,
            } => {
                self.on_vm_task_completed(task_id, vm_id, requester);
            }
        })
    }
}
