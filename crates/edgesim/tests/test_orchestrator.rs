use std::collections::HashMap;
use std::rc::Rc;

use rstest::rstest;
use sugars::{rc, refcell};

use edgesim::config::{OrchestratorConfig, OrchestratorScenario};
use edgesim::mobility::{Location, StaticMobility};
use edgesim::orchestrator::{BasicEdgeOrchestrator, EdgeOrchestrator, TierPolicy};
use edgesim::placement::FitStrategy;
use edgesim::resources::{ResourceModel, VmClass, VmId, VmInfo};
use edgesim::task::{Task, TaskDescriptor, Tier, CLOUD_DATACENTER_ID, GENERIC_EDGE_DEVICE_ID};
use edgesim_core::Simulation;

fn descriptor(critical: bool, deadline: f64) -> TaskDescriptor {
    TaskDescriptor {
        start_time: 0.,
        mobile_device_id: 0,
        task_type: 0,
        length: 1000,
        pes_number: 1,
        input_file_size: 100,
        output_file_size: 100,
        deadline,
        critical,
        priority: 0,
    }
}

fn task(critical: bool, deadline: f64) -> Task {
    Task::new(
        1,
        descriptor(critical, deadline),
        0.,
        Location {
            serving_access_point: 0,
        },
        Rc::new(|class| match class {
            VmClass::Edge => 20.,
            VmClass::Cloud => 5.,
        }),
    )
}

/// Hosts with fixed VM utilization.
struct FixedResources {
    edge: Vec<Vec<VmInfo>>,
    cloud: Vec<Vec<VmInfo>>,
    access_points: HashMap<u32, usize>,
    utilization: HashMap<VmId, f64>,
}

impl FixedResources {
    /// Builds hosts from utilization of their VMs, edge host `i` is attached to access point `i`.
    fn new(edge: &[&[f64]], cloud: &[&[f64]]) -> Self {
        let mut resources = FixedResources {
            edge: Vec::new(),
            cloud: Vec::new(),
            access_points: HashMap::new(),
            utilization: HashMap::new(),
        };
        let mut vm_id = 0;
        let mut host_id = 0;
        for (class, hosts) in [(VmClass::Edge, edge), (VmClass::Cloud, cloud)] {
            for (index, host) in hosts.iter().enumerate() {
                let mut vms = Vec::new();
                for u in host.iter() {
                    vms.push(VmInfo {
                        id: vm_id,
                        host_id,
                        datacenter_id: if class == VmClass::Edge {
                            index as u32
                        } else {
                            CLOUD_DATACENTER_ID
                        },
                        class,
                        mips: 1000.,
                    });
                    resources.utilization.insert(vm_id, *u);
                    vm_id += 1;
                }
                match class {
                    VmClass::Edge => {
                        resources.access_points.insert(index as u32, index);
                        resources.edge.push(vms);
                    }
                    VmClass::Cloud => resources.cloud.push(vms),
                }
                host_id += 1;
            }
        }
        resources
    }
}

impl ResourceModel for FixedResources {
    fn edge_host_count(&self) -> usize {
        self.edge.len()
    }

    fn edge_host_at(&self, access_point: u32) -> Option<usize> {
        self.access_points.get(&access_point).copied()
    }

    fn edge_vms(&self, host_index: usize) -> &[VmInfo] {
        &self.edge[host_index]
    }

    fn cloud_host_count(&self) -> usize {
        self.cloud.len()
    }

    fn cloud_vms(&self, host_index: usize) -> &[VmInfo] {
        &self.cloud[host_index]
    }

    fn utilization(&self, vm_id: VmId, _time: f64) -> f64 {
        self.utilization[&vm_id]
    }
}

fn orchestrator(
    policy: FitStrategy,
    scenario: OrchestratorScenario,
    resources: FixedResources,
    access_point: u32,
) -> BasicEdgeOrchestrator {
    let mut sim = Simulation::new(123);
    let config = OrchestratorConfig {
        policy,
        scenario,
        deadline_threshold: 10.,
    };
    BasicEdgeOrchestrator::new(
        &config,
        rc!(refcell!(resources)),
        rc!(StaticMobility::new(access_point)),
        sim.create_context("orchestrator"),
    )
}

#[rstest]
#[case(true, 100., Tier::Edge)]
#[case(true, 3., Tier::Edge)]
#[case(false, 5., Tier::Edge)]
#[case(false, 10., Tier::Edge)]
#[case(false, 10.5, Tier::Cloud)]
#[case(false, 20., Tier::Cloud)]
fn test_tier_selection(#[case] critical: bool, #[case] deadline: f64, #[case] expected: Tier) {
    let policy = TierPolicy::default();
    assert_eq!(policy.select_tier(&descriptor(critical, deadline)), expected);
}

#[test]
fn test_device_to_offload_returns_tier_ids() {
    let resources = FixedResources::new(&[&[0.]], &[&[0.]]);
    let mut orch = orchestrator(FitStrategy::FirstFit, OrchestratorScenario::TwoTier, resources, 0);
    assert_eq!(orch.device_to_offload(&task(true, 100.)), GENERIC_EDGE_DEVICE_ID);
    assert_eq!(orch.device_to_offload(&task(false, 20.)), CLOUD_DATACENTER_ID);
}

#[test]
fn test_cloud_always_uses_worst_fit() {
    // cloud VMs get ids 3, 4, 5
    let resources = FixedResources::new(&[&[0., 0., 0.]], &[&[50., 20.], &[90.]]);
    let mut orch = orchestrator(FitStrategy::FirstFit, OrchestratorScenario::TwoTier, resources, 0);
    let vm = orch.vm_to_offload(&task(false, 20.), Tier::Cloud).unwrap();
    assert_eq!(vm.id, 4);
    assert_eq!(vm.class, VmClass::Cloud);
    assert_eq!(vm.datacenter_id, CLOUD_DATACENTER_ID);
}

#[test]
fn test_edge_uses_host_of_serving_access_point() {
    let resources = FixedResources::new(&[&[0., 0.], &[70., 85.]], &[&[0.]]);
    let mut orch = orchestrator(FitStrategy::BestFit, OrchestratorScenario::TwoTier, resources, 1);
    let vm = orch.vm_to_offload(&task(true, 5.), Tier::Edge).unwrap();
    assert_eq!(vm.id, 2);
    assert_eq!(vm.datacenter_id, 1);
}

#[test]
fn test_edge_without_local_host_has_no_vm() {
    let resources = FixedResources::new(&[&[0., 0.]], &[&[0.]]);
    let mut orch = orchestrator(FitStrategy::FirstFit, OrchestratorScenario::TwoTier, resources, 5);
    assert_eq!(orch.vm_to_offload(&task(true, 5.), Tier::Edge), None);
}

#[test]
fn test_edge_capacity_exhausted() {
    let resources = FixedResources::new(&[&[85., 90.], &[0.]], &[&[0.]]);
    let mut orch = orchestrator(FitStrategy::WorstFit, OrchestratorScenario::TwoTier, resources, 0);
    assert_eq!(orch.vm_to_offload(&task(true, 5.), Tier::Edge), None);
}

#[test]
fn test_load_balancing_considers_all_edge_hosts() {
    let resources = FixedResources::new(&[&[85., 90.], &[60., 30.], &[75.]], &[&[0.]]);
    let mut orch = orchestrator(FitStrategy::BestFit, OrchestratorScenario::TwoTierWithEo, resources, 0);
    let vm = orch.vm_to_offload(&task(true, 5.), Tier::Edge).unwrap();
    assert_eq!(vm.id, 4);
    assert_eq!(vm.datacenter_id, 2);

    let resources = FixedResources::new(&[&[85., 90.], &[60., 30.], &[75.]], &[&[0.]]);
    let mut orch = orchestrator(FitStrategy::WorstFit, OrchestratorScenario::TwoTierWithEo, resources, 0);
    assert_eq!(orch.vm_to_offload(&task(true, 5.), Tier::Edge).unwrap().id, 3);
}

#[test]
fn test_next_fit_state_survives_between_tasks() {
    let resources = FixedResources::new(&[&[0., 0., 0.]], &[&[0.]]);
    let mut orch = orchestrator(FitStrategy::NextFit, OrchestratorScenario::TwoTier, resources, 0);
    let t = task(true, 5.);
    let ids: Vec<_> = (0..4)
        .map(|_| orch.vm_to_offload(&t, Tier::Edge).unwrap().id)
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 0]);
    assert_eq!(orch.policy(), FitStrategy::NextFit);
}
