//! Worker system
//!
//! - `Worker`: the contract every worker implements
//! - `Capability`: tools and instructions bound to a worker
//! - `CapabilityRegistry`: loads capabilities from builtins and config files
//! - `workers`: the built-in implementations

mod builtins;
mod config;
mod config_loader;
mod registry;
mod worker;
pub mod workers;

pub use builtins::builtin_capabilities;
pub use config::*;
pub use config_loader::{load_capability_overrides, project_config_dir};
pub use registry::CapabilityRegistry;
pub use worker::*;
pub use workers::{builtin_workers, builtin_workers_with_model, WorkerSet};
