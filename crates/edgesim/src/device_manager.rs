//! Task lifecycle coordination.

use std::cell::RefCell;
use std::rc::Rc;

use edgesim_core::{cast, log_debug, log_error, log_info, Event, EventHandler, Id, SimulationContext};

use crate::config::{ConfigError, SimulationConfig};
use crate::error::SimulationError;
use crate::events::device::{RequestReceived, ResponseReceived, TaskArrival, TaskExecuted};
use crate::events::server::ExecuteTask;
use crate::mobility::MobilityModel;
use crate::network::{DelayKind, NetworkModel};
use crate::orchestrator::EdgeOrchestrator;
use crate::stats::StatsSink;
use crate::task::{Placement, Task, TaskDescriptor, TaskId, TaskState, Tier, Transition, UtilizationFn};

/// Drives tasks from submission to delivery or failure.
///
/// Each step of the task lifecycle is a reaction to an event:
///
/// * `TaskArrival`: the task is admitted, routed to a tier and its upload starts.
/// * `RequestReceived`: the upload is finished, a VM is selected and the task is sent to execution.
/// * `TaskExecuted`: the result download starts if the device is still reachable.
/// * `ResponseReceived`: the task is delivered.
///
/// Failures caused by bandwidth, mobility or lack of capacity end the task lifecycle.
/// Any other inconsistency means broken wiring or policy and aborts the simulation.
pub struct MobileDeviceManager {
    tasks: Vec<Task>,
    task_id_counter: TaskId,
    orchestrator: Box<dyn EdgeOrchestrator>,
    network: Rc<RefCell<dyn NetworkModel>>,
    mobility: Rc<dyn MobilityModel>,
    stats: Rc<RefCell<dyn StatsSink>>,
    server_manager_id: Id,
    config: Rc<SimulationConfig>,
    ctx: SimulationContext,
}

impl MobileDeviceManager {
    pub fn new(
        config: Rc<SimulationConfig>,
        orchestrator: Box<dyn EdgeOrchestrator>,
        network: Rc<RefCell<dyn NetworkModel>>,
        mobility: Rc<dyn MobilityModel>,
        stats: Rc<RefCell<dyn StatsSink>>,
        server_manager_id: Id,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            tasks: Vec::new(),
            task_id_counter: 0,
            orchestrator,
            network,
            mobility,
            stats,
            server_manager_id,
            config,
            ctx,
        }
    }

    pub fn set_orchestrator(&mut self, orchestrator: Box<dyn EdgeOrchestrator>) {
        self.orchestrator = orchestrator;
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        let idx = task_id.checked_sub(1)?;
        self.tasks.get(idx as usize)
    }

    /// All admitted tasks in order of admission.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    fn task_index(&self, task_id: TaskId) -> Result<usize, SimulationError> {
        match self.task(task_id) {
            Some(_) => Ok(task_id as usize - 1),
            None => Err(SimulationError::UnknownTask(task_id)),
        }
    }

    fn utilization_fn(&self, descriptor: &TaskDescriptor) -> Result<UtilizationFn, SimulationError> {
        let task_type = self.config.task_type(descriptor.task_type).cloned().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "task of device {} has unknown type {}",
                descriptor.mobile_device_id, descriptor.task_type
            ))
        })?;
        Ok(Rc::new(move |class| task_type.utilization_on(class)))
    }

    /// Moves the task into a failed state and records the failure.
    fn fail(&mut self, idx: usize, transition: Transition) -> Result<(), SimulationError> {
        let task = &mut self.tasks[idx];
        if let TaskState::Failed(reason) = task.apply(transition)? {
            log_info!(self.ctx, "task {} failed: {:?}", task.id(), reason);
            self.stats.borrow_mut().task_failed(task, reason, self.ctx.time());
        }
        Ok(())
    }

    fn submit_task(&mut self, descriptor: TaskDescriptor) -> Result<(), SimulationError> {
        let now = self.ctx.time();
        let cpu_utilization = self.utilization_fn(&descriptor)?;
        let location = self.mobility.location(descriptor.mobile_device_id, now);
        self.task_id_counter += 1;
        let task = Task::new(self.task_id_counter, descriptor, now, location, cpu_utilization);
        log_debug!(
            self.ctx,
            "admitted task {} of device {} at access point {}",
            task.id(),
            task.mobile_device_id(),
            location.serving_access_point
        );
        self.stats.borrow_mut().task_admitted(&task, now);
        self.tasks.push(task);
        let idx = self.tasks.len() - 1;

        let task = &self.tasks[idx];
        let device_id = self.orchestrator.device_to_offload(task);
        let tier = Tier::from_device_id(device_id).ok_or(SimulationError::UnknownTier(device_id))?;
        let delay = self
            .network
            .borrow()
            .upload_delay(task.mobile_device_id(), tier, task, now);
        log_debug!(self.ctx, "routed task {} to {:?}, upload delay {:.3}", task.id(), tier, delay);

        self.tasks[idx].set_target(tier);
        if delay <= 0. {
            return self.fail(idx, Transition::RejectUpload);
        }
        let task = &mut self.tasks[idx];
        task.apply(Transition::StartUpload)?;
        self.network.borrow_mut().upload_started(task.submitted_location(), tier);
        let mut stats = self.stats.borrow_mut();
        stats.task_started(task, now);
        stats.upload_delay_recorded(task, DelayKind::for_tier(tier), delay);
        self.ctx.emit_self(RequestReceived { task_id: task.id() }, delay);
        Ok(())
    }

    fn on_request_received(&mut self, task_id: TaskId) -> Result<(), SimulationError> {
        let idx = self.task_index(task_id)?;
        let task = &mut self.tasks[idx];
        let tier = task.target().ok_or(SimulationError::UnexpectedEvent {
            task_id,
            state: task.state(),
            transition: Transition::ReceiveRequest,
        })?;
        self.network.borrow_mut().upload_finished(task.submitted_location(), tier);
        task.apply(Transition::ReceiveRequest)?;

        let Some(vm) = self.orchestrator.vm_to_offload(task, tier) else {
            return self.fail(idx, Transition::RejectForCapacity);
        };
        task.bind(Placement {
            tier,
            datacenter_id: vm.datacenter_id,
            host_id: vm.host_id,
            vm_id: vm.id,
        })?;
        task.apply(Transition::AssignVm)?;
        let utilization = task.predict_utilization(vm.class);
        log_debug!(
            self.ctx,
            "assigned task {} to VM {} on host {} of datacenter {}",
            task_id,
            vm.id,
            vm.host_id,
            vm.datacenter_id
        );
        self.stats.borrow_mut().task_assigned(task, self.ctx.time());
        self.ctx.emit_now(
            ExecuteTask {
                task_id,
                vm_id: vm.id,
                length: task.length(),
                utilization,
            },
            self.server_manager_id,
        );
        Ok(())
    }

    fn on_task_executed(&mut self, task_id: TaskId) -> Result<(), SimulationError> {
        let now = self.ctx.time();
        let idx = self.task_index(task_id)?;
        let task = &self.tasks[idx];
        let tier = task
            .placement()
            .map(|p| p.tier)
            .ok_or(SimulationError::UnexpectedEvent {
                task_id,
                state: task.state(),
                transition: Transition::StartDownload,
            })?;
        self.stats.borrow_mut().task_executed(task, now);

        let delay = self
            .network
            .borrow()
            .download_delay(tier, task.mobile_device_id(), task, now);
        if delay <= 0. {
            return self.fail(idx, Transition::RejectDownload);
        }
        let location = self.mobility.location(task.mobile_device_id(), now + delay);
        if location.serving_access_point != task.submitted_location().serving_access_point {
            log_debug!(
                self.ctx,
                "device {} of task {} moved from access point {} to {}",
                task.mobile_device_id(),
                task_id,
                task.submitted_location().serving_access_point,
                location.serving_access_point
            );
            return self.fail(idx, Transition::LoseConnectivity);
        }

        let task = &mut self.tasks[idx];
        task.apply(Transition::StartDownload)?;
        self.network.borrow_mut().download_started(task.submitted_location(), tier);
        self.stats
            .borrow_mut()
            .download_delay_recorded(task, DelayKind::for_tier(tier), delay);
        self.ctx.emit_self(ResponseReceived { task_id }, delay);
        Ok(())
    }

    fn on_response_received(&mut self, task_id: TaskId) -> Result<(), SimulationError> {
        let idx = self.task_index(task_id)?;
        let task = &mut self.tasks[idx];
        task.apply(Transition::ReceiveResponse)?;
        if let Some(placement) = task.placement() {
            self.network
                .borrow_mut()
                .download_finished(task.submitted_location(), placement.tier);
        }
        log_debug!(
            self.ctx,
            "delivered task {} in {:.3}",
            task_id,
            self.ctx.time() - task.submission_time()
        );
        self.stats.borrow_mut().task_delivered(task, self.ctx.time());
        Ok(())
    }

    fn abort_on_error(&self, result: Result<(), SimulationError>) {
        if let Err(e) = result {
            log_error!(self.ctx, "{}", e);
            panic!("Simulation aborted: {}", e);
        }
    }
}

impl EventHandler for MobileDeviceManager {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            TaskArrival { descriptor } => {
                let result = self.submit_task(descriptor);
                self.abort_on_error(result);
            }
            RequestReceived { task_id } => {
                let result = self.on_request_received(task_id);
                self.abort_on_error(result);
            }
            TaskExecuted { task_id } => {
                let result = self.on_task_executed(task_id);
                self.abort_on_error(result);
            }
            ResponseReceived { task_id } => {
                let result = self.on_response_received(task_id);
                self.abort_on_error(result);
            }
        })
    }
}
