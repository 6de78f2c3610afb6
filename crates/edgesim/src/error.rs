//! Fatal simulation errors.
//!
//! Per-task failures (bandwidth, mobility, capacity) are regular task outcomes and are not represented here.
//! The errors below mean that the simulation itself is misconfigured or its components are wired incorrectly.

use thiserror::Error;

use crate::config::ConfigError;
use crate::task::{TaskId, TaskState, Transition};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("orchestrator selected unknown device {0}")]
    UnknownTier(u32),
    #[error("task {task_id} can't make transition {transition:?} from state {state:?}")]
    UnexpectedEvent {
        task_id: TaskId,
        state: TaskState,
        transition: Transition,
    },
    #[error("task {0} does not exist")]
    UnknownTask(TaskId),
    #[error("task {0} is already placed on a VM")]
    AlreadyPlaced(TaskId),
}
