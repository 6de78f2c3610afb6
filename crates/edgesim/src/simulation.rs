//! Main entry point for running simulations.

use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use edgesim_core::{log_info, Id, Simulation, SimulationContext};

use crate::config::SimulationConfig;
use crate::device_manager::MobileDeviceManager;
use crate::error::SimulationError;
use crate::events::device::TaskArrival;
use crate::mobility::{MobilityModel, NomadicMobility};
use crate::network::{NetworkModel, SharedChannelNetwork};
use crate::orchestrator::{BasicEdgeOrchestrator, EdgeOrchestrator};
use crate::resources::ServerManager;
use crate::stats::SimStats;
use crate::task::{Placement, TaskDescriptor, TaskId, TaskState};
use crate::workload::{IdleActiveLoadGenerator, Workload};

/// Wires together servers, orchestrator and mobile device manager on top of the simulation kernel.
pub struct EdgeSimulation {
    sim: Simulation,
    config: Rc<SimulationConfig>,
    server_manager: Rc<RefCell<ServerManager>>,
    device_manager: Rc<RefCell<MobileDeviceManager>>,
    device_manager_id: Id,
    mobility: Rc<dyn MobilityModel>,
    stats: Rc<RefCell<SimStats>>,
    ctx: SimulationContext,
}

impl EdgeSimulation {
    /// Creates simulation with nomadic mobility and shared-channel network.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let mobility: Rc<dyn MobilityModel> = rc!(NomadicMobility::new(&config, config.seed)?);
        let network = rc!(refcell!(SharedChannelNetwork::new(config.network.clone())));
        Self::with_models(config, network, mobility)
    }

    /// Creates simulation using the provided network and mobility models.
    pub fn with_models(
        config: SimulationConfig,
        network: Rc<RefCell<dyn NetworkModel>>,
        mobility: Rc<dyn MobilityModel>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let config = rc!(config);
        let mut sim = Simulation::new(config.seed);

        let server_manager = rc!(refcell!(ServerManager::new(&config, sim.create_context("servers"))));
        let server_manager_id = sim.add_handler("servers", server_manager.clone());

        let orchestrator = BasicEdgeOrchestrator::new(
            &config.orchestrator,
            server_manager.clone(),
            mobility.clone(),
            sim.create_context("orchestrator"),
        );
        let stats = rc!(refcell!(SimStats::default()));
        let device_manager = rc!(refcell!(MobileDeviceManager::new(
            config.clone(),
            Box::new(orchestrator),
            network,
            mobility.clone(),
            stats.clone(),
            server_manager_id,
            sim.create_context("devices"),
        )));
        let device_manager_id = sim.add_handler("devices", device_manager.clone());
        let ctx = sim.create_context("simulation");

        Ok(Self {
            sim,
            config,
            server_manager,
            device_manager,
            device_manager_id,
            mobility,
            stats,
            ctx,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Generates the workload from the configured seed.
    pub fn generate_workload(&self) -> Result<Workload, SimulationError> {
        let generator = IdleActiveLoadGenerator::new(&self.config)?;
        Ok(generator.generate(self.config.seed))
    }

    /// Schedules arrival of the task at its start time.
    ///
    /// Tasks whose start time has already passed arrive immediately.
    pub fn submit(&mut self, descriptor: TaskDescriptor) {
        let delay = (descriptor.start_time - self.ctx.time()).max(0.);
        self.ctx.emit(TaskArrival { descriptor }, self.device_manager_id, delay);
    }

    pub fn load_workload(&mut self, workload: &Workload) {
        for descriptor in &workload.tasks {
            self.submit(descriptor.clone());
        }
        log_info!(
            self.ctx,
            "loaded {} tasks of {} devices",
            workload.tasks.len(),
            workload.device_count()
        );
    }

    /// Replaces the default orchestrator, must be called before any task is submitted.
    pub fn set_orchestrator(&mut self, orchestrator: Box<dyn EdgeOrchestrator>) {
        self.device_manager.borrow_mut().set_orchestrator(orchestrator);
    }

    /// Creates a context for a user-defined component, e.g. a custom orchestrator.
    pub fn create_context<S: AsRef<str>>(&mut self, name: S) -> SimulationContext {
        self.sim.create_context(name)
    }

    pub fn server_manager(&self) -> Rc<RefCell<ServerManager>> {
        self.server_manager.clone()
    }

    pub fn device_manager(&self) -> Rc<RefCell<MobileDeviceManager>> {
        self.device_manager.clone()
    }

    pub fn mobility(&self) -> Rc<dyn MobilityModel> {
        self.mobility.clone()
    }

    pub fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        self.device_manager.borrow().task(task_id).map(|t| t.state())
    }

    pub fn task_placement(&self, task_id: TaskId) -> Option<Placement> {
        self.device_manager
            .borrow()
            .task(task_id)
            .and_then(|t| t.placement().copied())
    }

    pub fn stats(&self) -> SimStats {
        self.stats.borrow().clone()
    }

    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    /// Performs a single step through the simulation.
    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        self.sim.step_for_duration(duration)
    }

    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events()
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }
}
