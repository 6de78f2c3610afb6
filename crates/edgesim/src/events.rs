//! Simulation events.

// MOBILE DEVICE EVENTS ////////////////////////////////////////////////////////////////////////////

pub mod device {
    use serde::Serialize;

    use crate::task::{TaskDescriptor, TaskId};

    /// New task is generated by a mobile device.
    #[derive(Serialize, Clone)]
    pub struct TaskArrival {
        pub descriptor: TaskDescriptor,
    }

    /// Task input has been uploaded to the target tier.
    #[derive(Serialize, Clone)]
    pub struct RequestReceived {
        pub task_id: TaskId,
    }

    /// Task output has been downloaded by the mobile device.
    #[derive(Serialize, Clone)]
    pub struct ResponseReceived {
        pub task_id: TaskId,
    }

    /// VM has finished executing the task.
    #[derive(Serialize, Clone)]
    pub struct TaskExecuted {
        pub task_id: TaskId,
    }
}

// SERVER EVENTS ///////////////////////////////////////////////////////////////////////////////////

pub mod server {
    use serde::Serialize;

    use edgesim_core::Id;

    use crate::resources::VmId;
    use crate::task::TaskId;

    /// Request to run the task on the VM.
    #[derive(Serialize, Clone)]
    pub struct ExecuteTask {
        pub task_id: TaskId,
        pub vm_id: VmId,
        pub length: u64,
        pub utilization: f64,
    }

    #[derive(Serialize, Clone)]
    pub struct VmTaskCompleted {
        pub task_id: TaskId,
        pub vm_id: VmId,
        pub requester: Id,
    }
}
