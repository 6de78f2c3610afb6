//! Device mobility.

use rand::prelude::*;
use rand_distr::Exp;
use rand_pcg::Pcg64;
use serde::Serialize;

use crate::config::{ConfigError, SimulationConfig};

/// Network attachment point of a device at some moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Location {
    pub serving_access_point: u32,
}

/// Answers where a device is located at the given time.
pub trait MobilityModel {
    fn location(&self, device_id: u32, time: f64) -> Location;
}

/// Nomadic mobility: a device stays at an access point for an exponentially distributed time
/// with the mean configured for that access point, then moves to another randomly chosen access point.
///
/// Trajectories of all devices are generated upfront for the whole simulation horizon,
/// so the model is deterministic and does not consume the simulation random generator.
pub struct NomadicMobility {
    trajectories: Vec<Vec<(f64, Location)>>,
}

impl NomadicMobility {
    pub fn new(config: &SimulationConfig, seed: u64) -> Result<Self, ConfigError> {
        let access_points = &config.mobility.access_points;
        if access_points.is_empty() {
            return Err(ConfigError::Invalid("at least one access point is required".to_string()));
        }
        let mut dwell_times = Vec::with_capacity(access_points.len());
        for ap in access_points {
            let dist = Exp::new(1. / ap.mean_dwell_time).map_err(|e| {
                ConfigError::Invalid(format!("access point {}: bad mean_dwell_time: {}", ap.id, e))
            })?;
            dwell_times.push(dist);
        }

        let mut rng = Pcg64::seed_from_u64(seed);
        let mut trajectories = Vec::with_capacity(config.mobile_devices as usize);
        for _ in 0..config.mobile_devices {
            let mut ap_index = rng.gen_range(0..access_points.len());
            let mut time = 0.;
            let mut trajectory = Vec::new();
            while time < config.simulation_time {
                trajectory.push((
                    time,
                    Location {
                        serving_access_point: access_points[ap_index].id,
                    },
                ));
                time += dwell_times[ap_index].sample(&mut rng);
                if access_points.len() > 1 {
                    // move to any other access point
                    let next = rng.gen_range(0..access_points.len() - 1);
                    ap_index = if next >= ap_index { next + 1 } else { next };
                }
            }
            trajectories.push(trajectory);
        }
        Ok(Self { trajectories })
    }

    /// Times at which the device changes its access point, including the initial attachment at zero.
    pub fn trajectory(&self, device_id: u32) -> &[(f64, Location)] {
        self.trajectories.get(device_id as usize).map_or(&[][..], |t| t.as_slice())
    }
}

impl MobilityModel for NomadicMobility {
    fn location(&self, device_id: u32, time: f64) -> Location {
        let trajectory = self.trajectory(device_id);
        let idx = trajectory.partition_point(|(t, _)| *t <= time);
        if idx == 0 {
            // unknown device or time before zero
            return trajectory.first().map_or(
                Location {
                    serving_access_point: 0,
                },
                |(_, loc)| *loc,
            );
        }
        trajectory[idx - 1].1
    }
}

/// Devices never move and stay at the given access point.
pub struct StaticMobility {
    location: Location,
}

impl StaticMobility {
    pub fn new(access_point: u32) -> Self {
        Self {
            location: Location {
                serving_access_point: access_point,
            },
        }
    }
}

impl MobilityModel for StaticMobility {
    fn location(&self, _device_id: u32, _time: f64) -> Location {
        self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessPointConfig;

    fn config(access_points: Vec<AccessPointConfig>) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.mobile_devices = 5;
        config.simulation_time = 3600.;
        config.mobility.access_points = access_points;
        config
    }

    #[test]
    fn test_moves_change_access_point() {
        let config = config(vec![
            AccessPointConfig {
                id: 0,
                mean_dwell_time: 60.,
            },
            AccessPointConfig {
                id: 1,
                mean_dwell_time: 120.,
            },
            AccessPointConfig {
                id: 2,
                mean_dwell_time: 30.,
            },
        ]);
        let mobility = NomadicMobility::new(&config, 42).unwrap();
        for device in 0..5 {
            let trajectory = mobility.trajectory(device);
            assert!(trajectory.len() > 1);
            assert_eq!(trajectory[0].0, 0.);
            for pair in trajectory.windows(2) {
                assert!(pair[0].0 < pair[1].0);
                assert_ne!(pair[0].1, pair[1].1);
            }
            let (t, loc) = trajectory[1];
            assert_eq!(mobility.location(device, t), loc);
            assert_eq!(mobility.location(device, t - 1e-6), trajectory[0].1);
        }
    }

    #[test]
    fn test_single_access_point() {
        let config = config(vec![AccessPointConfig {
            id: 7,
            mean_dwell_time: 100.,
        }]);
        let mobility = NomadicMobility::new(&config, 1).unwrap();
        for time in [0., 50., 1000., 3599.] {
            assert_eq!(mobility.location(3, time).serving_access_point, 7);
        }
    }

    #[test]
    fn test_same_seed_same_trajectories() {
        let config = config(vec![
            AccessPointConfig {
                id: 0,
                mean_dwell_time: 60.,
            },
            AccessPointConfig {
                id: 1,
                mean_dwell_time: 60.,
            },
        ]);
        let a = NomadicMobility::new(&config, 5).unwrap();
        let b = NomadicMobility::new(&config, 5).unwrap();
        for device in 0..5 {
            assert_eq!(a.trajectory(device), b.trajectory(device));
        }
    }
}
