//! VM fit strategies.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::resources::VmInfo;

/// Algorithm for choosing one VM among the candidates able to run the task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitStrategy {
    /// The first suitable VM in enumeration order.
    FirstFit,
    /// The first suitable VM after the one selected last time, wrapping around.
    NextFit,
    /// The suitable VM with the least available capacity.
    BestFit,
    /// The suitable VM with the most available capacity.
    WorstFit,
    /// A random VM, used only if it is suitable.
    RandomFit,
}

impl FromStr for FitStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "firstfit" => Ok(FitStrategy::FirstFit),
            "nextfit" => Ok(FitStrategy::NextFit),
            "bestfit" => Ok(FitStrategy::BestFit),
            "worstfit" => Ok(FitStrategy::WorstFit),
            "randomfit" => Ok(FitStrategy::RandomFit),
            _ => Err(ConfigError::Invalid(format!("unknown fit strategy: {}", s))),
        }
    }
}

/// VM considered for running a task.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub vm: VmInfo,
    /// Utilization the task would add to the VM.
    pub required: f64,
    /// Spare utilization of the VM, that is `100 - current utilization`.
    pub available: f64,
}

impl Candidate {
    pub fn fits(&self) -> bool {
        self.required <= self.available
    }
}

/// Returns the key of the first suitable candidate.
pub fn first_fit<'a, K>(candidates: impl IntoIterator<Item = (K, &'a Candidate)>) -> Option<K> {
    candidates.into_iter().find(|(_, c)| c.fits()).map(|(key, _)| key)
}

/// Returns the key of the suitable candidate with minimal available capacity.
///
/// Ties are resolved in favor of the earlier candidate.
pub fn best_fit<'a, K>(candidates: impl IntoIterator<Item = (K, &'a Candidate)>) -> Option<K> {
    let mut result: Option<(K, f64)> = None;
    for (key, c) in candidates {
        if c.fits() && result.as_ref().map_or(true, |(_, best)| c.available < *best) {
            result = Some((key, c.available));
        }
    }
    result.map(|(key, _)| key)
}

/// Returns the key of the suitable candidate with maximal available capacity.
///
/// Ties are resolved in favor of the earlier candidate.
pub fn worst_fit<'a, K>(candidates: impl IntoIterator<Item = (K, &'a Candidate)>) -> Option<K> {
    let mut result: Option<(K, f64)> = None;
    for (key, c) in candidates {
        if c.fits() && result.as_ref().map_or(true, |(_, worst)| c.available > *worst) {
            result = Some((key, c.available));
        }
    }
    result.map(|(key, _)| key)
}

/// Scans `candidates` starting right after `cursor`, visiting each candidate at most once.
///
/// The cursor is left at the last visited candidate.
fn next_fit(candidates: &[Candidate], cursor: &mut Option<usize>) -> Option<usize> {
    let n = candidates.len();
    if n == 0 {
        return None;
    }
    let start = cursor.map_or(0, |c| (c + 1) % n);
    for tries in 0..n {
        let index = (start + tries) % n;
        *cursor = Some(index);
        if candidates[index].fits() {
            return Some(index);
        }
    }
    None
}

/// Applies the configured fit strategy and keeps the next-fit cursors between calls.
///
/// Random choices are delegated to `pick`, which must return a uniformly random index below its argument,
/// so that the selector can share the simulation-wide random generator.
pub struct VmSelector {
    strategy: FitStrategy,
    vm_cursors: HashMap<usize, usize>,
    host_cursor: Option<usize>,
}

impl VmSelector {
    pub fn new(strategy: FitStrategy) -> Self {
        Self {
            strategy,
            vm_cursors: HashMap::new(),
            host_cursor: None,
        }
    }

    pub fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    fn next_fit_on_host(&mut self, host: usize, candidates: &[Candidate]) -> Option<usize> {
        let mut cursor = self.vm_cursors.get(&host).copied();
        let result = next_fit(candidates, &mut cursor);
        if let Some(cursor) = cursor {
            self.vm_cursors.insert(host, cursor);
        }
        result
    }

    /// Selects a VM among the VMs of a single host, returns its index in `candidates`.
    pub fn select_on_host<P>(&mut self, host: usize, candidates: &[Candidate], mut pick: P) -> Option<usize>
    where
        P: FnMut(usize) -> usize,
    {
        match self.strategy {
            FitStrategy::FirstFit => first_fit(candidates.iter().enumerate()),
            FitStrategy::BestFit => best_fit(candidates.iter().enumerate()),
            FitStrategy::WorstFit => worst_fit(candidates.iter().enumerate()),
            FitStrategy::NextFit => self.next_fit_on_host(host, candidates),
            FitStrategy::RandomFit => {
                if candidates.is_empty() {
                    return None;
                }
                let index = pick(candidates.len());
                candidates[index].fits().then_some(index)
            }
        }
    }

    /// Selects a VM among the VMs of all hosts in the pool, returns `(host index, VM index)`.
    pub fn select_in_pool<P>(&mut self, hosts: &[Vec<Candidate>], mut pick: P) -> Option<(usize, usize)>
    where
        P: FnMut(usize) -> usize,
    {
        let all = || {
            hosts
                .iter()
                .enumerate()
                .flat_map(|(h, vms)| vms.iter().enumerate().map(move |(v, c)| ((h, v), c)))
        };
        match self.strategy {
            FitStrategy::FirstFit => first_fit(all()),
            FitStrategy::BestFit => best_fit(all()),
            FitStrategy::WorstFit => worst_fit(all()),
            FitStrategy::NextFit => {
                let n = hosts.len();
                for _ in 0..n {
                    let host = self.host_cursor.map_or(0, |c| (c + 1) % n);
                    self.host_cursor = Some(host);
                    if let Some(vm) = self.next_fit_on_host(host, &hosts[host]) {
                        return Some((host, vm));
                    }
                }
                None
            }
            FitStrategy::RandomFit => {
                if hosts.is_empty() {
                    return None;
                }
                let host = pick(hosts.len());
                let vms = &hosts[host];
                if vms.is_empty() {
                    return None;
                }
                let vm = pick(vms.len());
                vms[vm].fits().then_some((host, vm))
            }
        }
    }
}
