//! Tasks and their lifecycle.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::mobility::Location;
use crate::resources::{HostId, VmClass, VmId};

pub type TaskId = u64;

/// Identifier of the cloud datacenter as returned by the orchestrator.
pub const CLOUD_DATACENTER_ID: u32 = 1000;
/// Identifier standing for "some edge server" as returned by the orchestrator.
pub const GENERIC_EDGE_DEVICE_ID: u32 = 1003;

/// Coarse execution location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Edge,
    Cloud,
}

impl Tier {
    pub fn device_id(self) -> u32 {
        match self {
            Tier::Edge => GENERIC_EDGE_DEVICE_ID,
            Tier::Cloud => CLOUD_DATACENTER_ID,
        }
    }

    pub fn from_device_id(id: u32) -> Option<Self> {
        match id {
            GENERIC_EDGE_DEVICE_ID => Some(Tier::Edge),
            CLOUD_DATACENTER_ID => Some(Tier::Cloud),
            _ => None,
        }
    }
}

/// Task arrival produced by the workload generator before the simulation starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub start_time: f64,
    pub mobile_device_id: u32,
    pub task_type: usize,
    /// Task length in MI.
    pub length: u64,
    pub pes_number: u32,
    /// Input size in KB.
    pub input_file_size: u64,
    /// Output size in KB.
    pub output_file_size: u64,
    /// Time in seconds from arrival by which the result should be delivered.
    pub deadline: f64,
    pub critical: bool,
    /// Not used by placement yet.
    pub priority: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureReason {
    /// Upload or download channel could not take the transfer.
    Bandwidth,
    /// Device left the coverage of the access point it submitted the task from.
    Mobility,
    /// No VM had enough spare CPU capacity.
    Capacity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Admitted,
    Uploading,
    AwaitingPlacement,
    Executing,
    Downloading,
    Delivered,
    Failed(FailureReason),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Delivered | TaskState::Failed(_))
    }

    /// Transition table of the task lifecycle.
    ///
    /// Returns `None` if the transition is not allowed from this state.
    pub fn apply(self, transition: Transition) -> Option<TaskState> {
        use FailureReason::*;
        use TaskState::*;
        use Transition::*;

        match (self, transition) {
            (Admitted, StartUpload) => Some(Uploading),
            (Admitted, RejectUpload) => Some(Failed(Bandwidth)),
            (Uploading, ReceiveRequest) => Some(AwaitingPlacement),
            (AwaitingPlacement, AssignVm) => Some(Executing),
            (AwaitingPlacement, RejectForCapacity) => Some(Failed(Capacity)),
            (Executing, StartDownload) => Some(Downloading),
            (Executing, LoseConnectivity) => Some(Failed(Mobility)),
            (Executing, RejectDownload) => Some(Failed(Bandwidth)),
            (Downloading, ReceiveResponse) => Some(Delivered),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Transition {
    StartUpload,
    RejectUpload,
    ReceiveRequest,
    AssignVm,
    RejectForCapacity,
    StartDownload,
    LoseConnectivity,
    RejectDownload,
    ReceiveResponse,
}

/// VM the task was bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub tier: Tier,
    pub datacenter_id: u32,
    pub host_id: HostId,
    pub vm_id: VmId,
}

/// Predicts the CPU utilization (in percent) the task adds to a VM of the given class.
pub type UtilizationFn = Rc<dyn Fn(VmClass) -> f64>;

/// Admitted task, owned and advanced by the mobile device manager.
pub struct Task {
    id: TaskId,
    descriptor: TaskDescriptor,
    submission_time: f64,
    submitted_location: Location,
    target: Option<Tier>,
    placement: Option<Placement>,
    state: TaskState,
    cpu_utilization: UtilizationFn,
}

impl Task {
    pub fn new(
        id: TaskId,
        descriptor: TaskDescriptor,
        submission_time: f64,
        submitted_location: Location,
        cpu_utilization: UtilizationFn,
    ) -> Self {
        Self {
            id,
            descriptor,
            submission_time,
            submitted_location,
            target: None,
            placement: None,
            state: TaskState::Admitted,
            cpu_utilization,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    pub fn mobile_device_id(&self) -> u32 {
        self.descriptor.mobile_device_id
    }

    pub fn task_type(&self) -> usize {
        self.descriptor.task_type
    }

    pub fn length(&self) -> u64 {
        self.descriptor.length
    }

    pub fn input_file_size(&self) -> u64 {
        self.descriptor.input_file_size
    }

    pub fn output_file_size(&self) -> u64 {
        self.descriptor.output_file_size
    }

    pub fn deadline(&self) -> f64 {
        self.descriptor.deadline
    }

    pub fn is_critical(&self) -> bool {
        self.descriptor.critical
    }

    pub fn submission_time(&self) -> f64 {
        self.submission_time
    }

    pub fn submitted_location(&self) -> &Location {
        &self.submitted_location
    }

    /// Tier selected by the orchestrator when the task was routed.
    pub fn target(&self) -> Option<Tier> {
        self.target
    }

    /// VM the task is bound to, set once when the task arrives at its target.
    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn predict_utilization(&self, class: VmClass) -> f64 {
        (self.cpu_utilization)(class)
    }

    pub(crate) fn set_target(&mut self, tier: Tier) {
        self.target = Some(tier);
    }

    pub(crate) fn bind(&mut self, placement: Placement) -> Result<(), SimulationError> {
        if self.placement.is_some() {
            return Err(SimulationError::AlreadyPlaced(self.id));
        }
        self.placement = Some(placement);
        Ok(())
    }

    pub(crate) fn apply(&mut self, transition: Transition) -> Result<TaskState, SimulationError> {
        let next = self.state.apply(transition).ok_or(SimulationError::UnexpectedEvent {
            task_id: self.id,
            state: self.state,
            transition,
        })?;
        self.state = next;
        Ok(next)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("submission_time", &self.submission_time)
            .field("submitted_location", &self.submitted_location)
            .field("target", &self.target)
            .field("placement", &self.placement)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
