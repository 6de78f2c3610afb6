//! Network delay models.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::NetworkConfig;
use crate::mobility::Location;
use crate::task::{Task, Tier};

/// Network segment a transfer goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DelayKind {
    /// Wireless access network between device and edge.
    Wlan,
    /// Wide-area network between device and cloud.
    Wan,
}

impl DelayKind {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Cloud => DelayKind::Wan,
            Tier::Edge => DelayKind::Wlan,
        }
    }
}

/// Estimates transfer delays and tracks the transfers in progress.
///
/// Delays are in seconds, a non-positive delay means that the transfer can't be started.
pub trait NetworkModel {
    fn upload_delay(&self, device_id: u32, target: Tier, task: &Task, time: f64) -> f64;
    fn download_delay(&self, source: Tier, device_id: u32, task: &Task, time: f64) -> f64;
    fn upload_started(&mut self, location: &Location, target: Tier);
    fn upload_finished(&mut self, location: &Location, target: Tier);
    fn download_started(&mut self, location: &Location, source: Tier);
    fn download_finished(&mut self, location: &Location, source: Tier);
}

/// Channels are identified by the serving access point and the tier on the other end.
/// Bandwidth of a channel is shared equally between its active transfers.
///
/// Both transfers of a task go through the access point the task was submitted at,
/// delays are estimated on the same channel that the start and finish hooks count.
pub struct SharedChannelNetwork {
    config: NetworkConfig,
    uploads: HashMap<(u32, Tier), u32>,
    downloads: HashMap<(u32, Tier), u32>,
}

impl SharedChannelNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            uploads: HashMap::new(),
            downloads: HashMap::new(),
        }
    }

    pub fn active_uploads(&self, access_point: u32, tier: Tier) -> u32 {
        self.uploads.get(&(access_point, tier)).copied().unwrap_or(0)
    }

    pub fn active_downloads(&self, access_point: u32, tier: Tier) -> u32 {
        self.downloads.get(&(access_point, tier)).copied().unwrap_or(0)
    }

    fn transfer_delay(&self, tier: Tier, active: u32, size_kb: u64) -> f64 {
        if active >= self.config.max_transfers_per_channel {
            return 0.;
        }
        let (bandwidth, propagation) = match DelayKind::for_tier(tier) {
            DelayKind::Wlan => (self.config.wlan_bandwidth, 0.),
            DelayKind::Wan => (self.config.wan_bandwidth, self.config.wan_propagation_delay),
        };
        let share = bandwidth / (active + 1) as f64;
        // empty payloads still need one packet
        propagation + (size_kb.max(1) * 8) as f64 / share
    }
}

fn increment(channels: &mut HashMap<(u32, Tier), u32>, key: (u32, Tier)) {
    *channels.entry(key).or_default() += 1;
}

fn decrement(channels: &mut HashMap<(u32, Tier), u32>, key: (u32, Tier)) {
    if let Some(count) = channels.get_mut(&key) {
        *count = count.saturating_sub(1);
    }
}

impl NetworkModel for SharedChannelNetwork {
    fn upload_delay(&self, _device_id: u32, target: Tier, task: &Task, _time: f64) -> f64 {
        let ap = task.submitted_location().serving_access_point;
        self.transfer_delay(target, self.active_uploads(ap, target), task.input_file_size())
    }

    fn download_delay(&self, source: Tier, _device_id: u32, task: &Task, _time: f64) -> f64 {
        let ap = task.submitted_location().serving_access_point;
        self.transfer_delay(source, self.active_downloads(ap, source), task.output_file_size())
    }

    fn upload_started(&mut self, location: &Location, target: Tier) {
        increment(&mut self.uploads, (location.serving_access_point, target));
    }

    fn upload_finished(&mut self, location: &Location, target: Tier) {
        decrement(&mut self.uploads, (location.serving_access_point, target));
    }

    fn download_started(&mut self, location: &Location, source: Tier) {
        increment(&mut self.downloads, (location.serving_access_point, source));
    }

    fn download_finished(&mut self, location: &Location, source: Tier) {
        decrement(&mut self.downloads, (location.serving_access_point, source));
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::resources::VmClass;
    use crate::task::TaskDescriptor;

    fn task(input: u64, output: u64) -> Task {
        task_at(0, input, output)
    }

    fn task_at(access_point: u32, input: u64, output: u64) -> Task {
        let descriptor = TaskDescriptor {
            start_time: 0.,
            mobile_device_id: 0,
            task_type: 0,
            length: 1000,
            pes_number: 1,
            input_file_size: input,
            output_file_size: output,
            deadline: 10.,
            critical: false,
            priority: 0,
        };
        Task::new(
            0,
            descriptor,
            0.,
            Location {
                serving_access_point: access_point,
            },
            Rc::new(|_: VmClass| 10.),
        )
    }

    fn network(max_transfers: u32) -> SharedChannelNetwork {
        let config = NetworkConfig {
            wlan_bandwidth: 1000.,
            wan_bandwidth: 100.,
            wan_propagation_delay: 0.5,
            max_transfers_per_channel: max_transfers,
        };
        SharedChannelNetwork::new(config)
    }

    #[test]
    fn test_wan_adds_propagation() {
        let net = network(4);
        let t = task(100, 50);
        assert_eq!(net.upload_delay(0, Tier::Edge, &t, 0.), 0.8);
        assert_eq!(net.upload_delay(0, Tier::Cloud, &t, 0.), 8.5);
        assert_eq!(net.download_delay(Tier::Cloud, 0, &t, 0.), 4.5);
    }

    #[test]
    fn test_bandwidth_is_shared() {
        let mut net = network(4);
        let t = task(100, 50);
        let loc = Location {
            serving_access_point: 0,
        };
        net.upload_started(&loc, Tier::Edge);
        assert_eq!(net.upload_delay(0, Tier::Edge, &t, 0.), 1.6);
        // downloads and other tiers use separate channels
        assert_eq!(net.upload_delay(0, Tier::Cloud, &t, 0.), 8.5);
        assert_eq!(net.download_delay(Tier::Edge, 0, &t, 0.), 0.4);
        net.upload_finished(&loc, Tier::Edge);
        assert_eq!(net.active_uploads(0, Tier::Edge), 0);
    }

    #[test]
    fn test_saturated_channel_rejects_transfer() {
        let mut net = network(1);
        let t = task(100, 50);
        let loc = Location {
            serving_access_point: 0,
        };
        net.download_started(&loc, Tier::Cloud);
        assert_eq!(net.download_delay(Tier::Cloud, 0, &t, 0.), 0.);
        net.download_finished(&loc, Tier::Cloud);
        assert!(net.download_delay(Tier::Cloud, 0, &t, 0.) > 0.);
    }

    #[test]
    fn test_empty_payload_has_positive_delay() {
        let net = network(4);
        assert!(net.upload_delay(0, Tier::Edge, &task(0, 0), 0.) > 0.);
    }

    #[test]
    fn test_transfers_use_submission_channel() {
        let mut net = network(1);
        let here = task_at(0, 100, 50);
        let elsewhere = task_at(1, 100, 50);
        net.download_started(here.submitted_location(), Tier::Edge);
        // the device of `here` may have moved, its download still shares the saturated channel
        assert_eq!(net.download_delay(Tier::Edge, 0, &here, 5.), 0.);
        assert_eq!(net.download_delay(Tier::Edge, 0, &elsewhere, 5.), 0.4);
        net.upload_started(elsewhere.submitted_location(), Tier::Cloud);
        assert_eq!(net.upload_delay(0, Tier::Cloud, &elsewhere, 5.), 0.);
        assert_eq!(net.upload_delay(0, Tier::Cloud, &here, 5.), 8.5);
    }
}
