#![doc = include_str!("../readme.md")]

pub mod config;
pub mod device_manager;
pub mod error;
pub mod events;
pub mod mobility;
pub mod network;
pub mod orchestrator;
pub mod placement;
pub mod resources;
pub mod simulation;
pub mod stats;
pub mod task;
pub mod workload;
