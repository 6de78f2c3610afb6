//! Workload generation.

use log::{debug, warn};
use rand::prelude::*;
use rand_distr::Exp;
use rand_pcg::Pcg64;

use crate::config::{ConfigError, DeadlineConfig, SimulationConfig, TaskTypeConfig};
use crate::task::TaskDescriptor;

/// Activity pattern of a single device.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceProfile {
    pub task_type: usize,
    pub first_active_start: f64,
    pub active_period: f64,
    pub idle_period: f64,
}

impl DeviceProfile {
    /// Checks whether the time falls into one of the device active periods (bounds included).
    pub fn is_active_at(&self, time: f64) -> bool {
        if time < self.first_active_start {
            return false;
        }
        let cycle = self.active_period + self.idle_period;
        let offset = (time - self.first_active_start) % cycle;
        offset <= self.active_period
    }
}

/// Task arrivals of all devices for one simulation run.
#[derive(Clone, Debug, Default)]
pub struct Workload {
    /// Arrivals grouped by device, ordered by time within a device.
    pub tasks: Vec<TaskDescriptor>,
    devices: Vec<Option<DeviceProfile>>,
}

impl Workload {
    /// Returns the task type generated by the device,
    /// `None` if the device generates nothing because task type percentages sum up to less than 100.
    pub fn task_type_of_device(&self, device_id: u32) -> Option<usize> {
        self.device(device_id).map(|d| d.task_type)
    }

    pub fn device(&self, device_id: u32) -> Option<&DeviceProfile> {
        self.devices.get(device_id as usize).and_then(|d| d.as_ref())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device_tasks(&self, device_id: u32) -> impl Iterator<Item = &TaskDescriptor> + '_ {
        self.tasks.iter().filter(move |t| t.mobile_device_id == device_id)
    }
}

struct TaskTypeSampler {
    interarrival: Exp<f64>,
    input_size: Exp<f64>,
    output_size: Exp<f64>,
    length: Exp<f64>,
}

fn exp(mean: f64, what: &str, task_type: &TaskTypeConfig) -> Result<Exp<f64>, ConfigError> {
    Exp::new(1. / mean)
        .map_err(|e| ConfigError::Invalid(format!("task type {}: bad {} {}: {}", task_type.name, what, mean, e)))
}

/// Generates tasks from the cyclic idle/active device behavior.
///
/// Each device gets a task type drawn from the configured mix. It starts its first active period
/// at a random moment within one active period after warm-up, then alternates active and idle periods
/// of the task type's durations. Within active periods tasks arrive as a Poisson process.
pub struct IdleActiveLoadGenerator {
    task_types: Vec<TaskTypeConfig>,
    samplers: Vec<TaskTypeSampler>,
    mobile_devices: u32,
    simulation_time: f64,
    warm_up_period: f64,
    deadline: DeadlineConfig,
}

impl IdleActiveLoadGenerator {
    /// Creates the generator, rejecting configs that fail [`SimulationConfig::validate`].
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut samplers = Vec::with_capacity(config.task_types.len());
        for t in &config.task_types {
            samplers.push(TaskTypeSampler {
                interarrival: exp(t.poisson_interarrival, "poisson_interarrival", t)?,
                input_size: exp(t.upload_size, "upload_size", t)?,
                output_size: exp(t.download_size, "download_size", t)?,
                length: exp(t.task_length, "task_length", t)?,
            });
        }
        Ok(Self {
            task_types: config.task_types.clone(),
            samplers,
            mobile_devices: config.mobile_devices,
            simulation_time: config.simulation_time,
            warm_up_period: config.warm_up_period,
            deadline: config.deadline.clone(),
        })
    }

    fn select_task_type<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        let selector = rng.gen_range(0. ..100.);
        let mut percentage = 0.;
        for (i, t) in self.task_types.iter().enumerate() {
            percentage += t.usage_percentage;
            if selector <= percentage {
                return Some(i);
            }
        }
        None
    }

    /// Generates the arrivals of all devices. The same seed always yields the same workload.
    pub fn generate(&self, seed: u64) -> Workload {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut workload = Workload::default();
        for device_id in 0..self.mobile_devices {
            let Some(task_type) = self.select_task_type(&mut rng) else {
                warn!("no task type selected for device {}, it will generate no tasks", device_id);
                workload.devices.push(None);
                continue;
            };
            let t = &self.task_types[task_type];
            let profile = DeviceProfile {
                task_type,
                first_active_start: rng.gen_range(self.warm_up_period..self.warm_up_period + t.active_period),
                active_period: t.active_period,
                idle_period: t.idle_period,
            };
            let before = workload.tasks.len();
            self.generate_device(device_id, &profile, &mut rng, &mut workload.tasks);
            debug!(
                "device {} generates {} tasks of type {}",
                device_id,
                workload.tasks.len() - before,
                t.name
            );
            workload.devices.push(Some(profile));
        }
        workload
    }

    fn generate_device<R: Rng>(
        &self,
        device_id: u32,
        profile: &DeviceProfile,
        rng: &mut R,
        tasks: &mut Vec<TaskDescriptor>,
    ) {
        let t = &self.task_types[profile.task_type];
        let sampler = &self.samplers[profile.task_type];
        let mut active_start = profile.first_active_start;
        let mut time = active_start;
        while time < self.simulation_time {
            let interval = sampler.interarrival.sample(rng);
            if interval <= 0. {
                continue;
            }
            time += interval;
            if time > active_start + profile.active_period {
                // skip the idle period
                active_start += profile.active_period + profile.idle_period;
                time = active_start;
                continue;
            }
            if time >= self.simulation_time {
                break;
            }
            let deadline = rng.gen_range(self.deadline.min..self.deadline.max);
            tasks.push(TaskDescriptor {
                start_time: time,
                mobile_device_id: device_id,
                task_type: profile.task_type,
                length: sampler.length.sample(rng) as u64,
                pes_number: t.required_cores,
                input_file_size: sampler.input_size.sample(rng) as u64,
                output_file_size: sampler.output_size.sample(rng) as u64,
                deadline,
                critical: deadline < self.deadline.critical_below,
                priority: 0,
            });
        }
    }
}
