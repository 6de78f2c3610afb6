//! Simulation configuration.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::placement::FitStrategy;
use crate::resources::VmClass;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn invalid<T>(msg: String) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg))
}

fn default_one() -> u32 {
    1
}

/// Describes one class of tasks generated by mobile devices.
///
/// All sizes and lengths are means of exponential distributions the actual values are drawn from.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct TaskTypeConfig {
    pub name: String,
    /// Share of devices (in percent) generating tasks of this type.
    pub usage_percentage: f64,
    /// Mean time in seconds between two task arrivals within an active period.
    pub poisson_interarrival: f64,
    /// Duration of device active period in seconds.
    pub active_period: f64,
    /// Duration of device idle period in seconds.
    pub idle_period: f64,
    /// Mean input size in KB.
    pub upload_size: f64,
    /// Mean output size in KB.
    pub download_size: f64,
    /// Mean task length in MI.
    pub task_length: f64,
    #[serde(default = "default_one")]
    pub required_cores: u32,
    /// CPU utilization (in percent) a task of this type adds to an edge VM.
    pub vm_utilization_on_edge: f64,
    /// CPU utilization (in percent) a task of this type adds to a cloud VM.
    pub vm_utilization_on_cloud: f64,
}

impl TaskTypeConfig {
    /// Returns the utilization a task of this type adds to a VM of the given class.
    pub fn utilization_on(&self, class: VmClass) -> f64 {
        match class {
            VmClass::Edge => self.vm_utilization_on_edge,
            VmClass::Cloud => self.vm_utilization_on_cloud,
        }
    }
}

/// A group of identical VMs.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct VmGroupConfig {
    pub mips: f64,
    #[serde(default = "default_one")]
    pub count: u32,
}

/// Edge host attached to a wireless access point.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct EdgeHostConfig {
    pub access_point: u32,
    pub vms: Vec<VmGroupConfig>,
}

/// Cloud host or a set of identical cloud hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct CloudHostConfig {
    pub vms: Vec<VmGroupConfig>,
    #[serde(default = "default_one")]
    pub count: u32,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct AccessPointConfig {
    pub id: u32,
    /// Mean time in seconds a device stays connected to this access point.
    pub mean_dwell_time: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MobilityConfig {
    pub access_points: Vec<AccessPointConfig>,
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            access_points: vec![AccessPointConfig {
                id: 0,
                mean_dwell_time: 300.,
            }],
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    /// WLAN bandwidth of a single access point in Kbps.
    pub wlan_bandwidth: f64,
    /// WAN bandwidth in Kbps.
    pub wan_bandwidth: f64,
    /// WAN propagation delay in seconds.
    pub wan_propagation_delay: f64,
    /// Maximum number of simultaneous transfers sharing one channel.
    pub max_transfers_per_channel: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wlan_bandwidth: 300_000.,
            wan_bandwidth: 20_000.,
            wan_propagation_delay: 0.1,
            max_transfers_per_channel: 16,
        }
    }
}

/// Defines how edge VMs are searched for.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorScenario {
    /// Only the edge host attached to the device's serving access point is considered.
    TwoTier,
    /// Edge orchestrator balances load among all edge hosts.
    TwoTierWithEo,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub policy: FitStrategy,
    pub scenario: OrchestratorScenario,
    /// Non-critical tasks with deadline at or below this value are processed at the edge.
    pub deadline_threshold: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            policy: FitStrategy::NextFit,
            scenario: OrchestratorScenario::TwoTier,
            deadline_threshold: 10.,
        }
    }
}

/// Deadlines are drawn uniformly from `[min, max)`, tasks with deadline below `critical_below` are critical.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DeadlineConfig {
    pub min: f64,
    pub max: f64,
    pub critical_below: f64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            min: 5.,
            max: 15.,
            critical_below: 10.,
        }
    }
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated horizon in seconds, no tasks arrive after it.
    pub simulation_time: f64,
    /// Devices start their first active period within one active period after this time.
    pub warm_up_period: f64,
    pub mobile_devices: u32,
    pub seed: u64,
    pub orchestrator: OrchestratorConfig,
    pub deadline: DeadlineConfig,
    pub network: NetworkConfig,
    pub mobility: MobilityConfig,
    pub edge_hosts: Vec<EdgeHostConfig>,
    pub cloud_hosts: Vec<CloudHostConfig>,
    pub task_types: Vec<TaskTypeConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation_time: 1800.,
            warm_up_period: 10.,
            mobile_devices: 100,
            seed: 123,
            orchestrator: OrchestratorConfig::default(),
            deadline: DeadlineConfig::default(),
            network: NetworkConfig::default(),
            mobility: MobilityConfig::default(),
            edge_hosts: Vec::new(),
            cloud_hosts: Vec::new(),
            task_types: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Reads config from YAML file (uses default values if some parameters are absent) and validates it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        yaml.parse()
    }

    pub fn task_type(&self, task_type: usize) -> Option<&TaskTypeConfig> {
        self.task_types.get(task_type)
    }

    /// Checks the semantic constraints serde can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation_time <= 0. {
            return invalid(format!("simulation_time must be positive, got {}", self.simulation_time));
        }
        if self.warm_up_period < 0. || self.warm_up_period >= self.simulation_time {
            return invalid(format!(
                "warm_up_period must be within [0, {}), got {}",
                self.simulation_time, self.warm_up_period
            ));
        }
        if self.orchestrator.deadline_threshold < 0. {
            return invalid("deadline_threshold must be non-negative".to_string());
        }
        if self.deadline.min < 0. || self.deadline.min >= self.deadline.max {
            return invalid(format!(
                "deadline range [{}, {}) is empty",
                self.deadline.min, self.deadline.max
            ));
        }
        self.validate_task_types()?;
        self.validate_network()?;
        self.validate_topology()
    }

    fn validate_task_types(&self) -> Result<(), ConfigError> {
        if self.task_types.is_empty() {
            return invalid("at least one task type is required".to_string());
        }
        let mut total_percentage = 0.;
        for t in &self.task_types {
            let positive = [
                ("poisson_interarrival", t.poisson_interarrival),
                ("active_period", t.active_period),
                ("upload_size", t.upload_size),
                ("download_size", t.download_size),
                ("task_length", t.task_length),
            ];
            for (name, value) in positive {
                if !(value > 0.) {
                    return invalid(format!("task type {}: {} must be positive", t.name, name));
                }
            }
            if t.usage_percentage < 0. || t.idle_period < 0. {
                return invalid(format!(
                    "task type {}: usage_percentage and idle_period must be non-negative",
                    t.name
                ));
            }
            if t.vm_utilization_on_edge < 0. || t.vm_utilization_on_cloud < 0. {
                return invalid(format!("task type {}: VM utilization must be non-negative", t.name));
            }
            total_percentage += t.usage_percentage;
        }
        if total_percentage > 100. + 1e-9 {
            return invalid(format!(
                "task type usage percentages sum up to {}, which is above 100",
                total_percentage
            ));
        }
        Ok(())
    }

    fn validate_network(&self) -> Result<(), ConfigError> {
        let n = &self.network;
        if !(n.wlan_bandwidth > 0.) || !(n.wan_bandwidth > 0.) {
            return invalid("network bandwidths must be positive".to_string());
        }
        if n.wan_propagation_delay < 0. {
            return invalid("wan_propagation_delay must be non-negative".to_string());
        }
        if n.max_transfers_per_channel == 0 {
            return invalid("max_transfers_per_channel must be positive".to_string());
        }
        Ok(())
    }

    fn validate_topology(&self) -> Result<(), ConfigError> {
        let access_points = &self.mobility.access_points;
        if access_points.is_empty() {
            return invalid("at least one access point is required".to_string());
        }
        let mut ids = HashSet::new();
        for ap in access_points {
            if !ids.insert(ap.id) {
                return invalid(format!("access point {} is defined twice", ap.id));
            }
            if !(ap.mean_dwell_time > 0.) {
                return invalid(format!("access point {}: mean_dwell_time must be positive", ap.id));
            }
        }
        let mut attached = HashSet::new();
        for host in &self.edge_hosts {
            if !ids.contains(&host.access_point) {
                return invalid(format!("edge host refers to unknown access point {}", host.access_point));
            }
            if !attached.insert(host.access_point) {
                return invalid(format!("access point {} has several edge hosts", host.access_point));
            }
            if host.vms.iter().all(|g| g.count == 0) {
                return invalid(format!("edge host at access point {} has no VMs", host.access_point));
            }
        }
        if self.cloud_hosts.iter().any(|h| h.vms.iter().all(|g| g.count == 0)) {
            return invalid("cloud host has no VMs".to_string());
        }
        let vm_groups = self
            .edge_hosts
            .iter()
            .flat_map(|h| h.vms.iter())
            .chain(self.cloud_hosts.iter().flat_map(|h| h.vms.iter()));
        for group in vm_groups {
            if !(group.mips > 0.) {
                return invalid(format!("VM mips must be positive, got {}", group.mips));
            }
        }
        Ok(())
    }
}

impl FromStr for SimulationConfig {
    type Err = ConfigError;

    /// Parses and validates config from YAML string.
    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        let config: SimulationConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
}
