//! Capability registry
//!
//! Built once while an orchestrator is constructed, then shared read-only
//! (behind an `Arc`) by every run of that orchestrator.
//!
//! Loading order (later overrides earlier):
//! 1. Built-in capabilities
//! 2. YAML overrides: ~/.config/trip/workers/*.yaml (global)
//! 3. YAML overrides: .trip/workers/*.yaml (project)

use super::builtins::builtin_capabilities;
use super::config::{Capability, CapabilityOverride};
use super::config_loader::load_capability_overrides;
use super::worker::WorkerId;
use crate::error::RegistryError;
use crate::tool::ToolRegistry;
use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: IndexMap<WorkerId, Capability>,
}

impl CapabilityRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with built-in capabilities only
    pub fn builtin() -> Self {
        Self {
            capabilities: builtin_capabilities(),
        }
    }

    /// Built-ins patched by YAML overrides found for `working_dir`
    pub fn with_config(working_dir: &Path) -> Self {
        let mut registry = Self::builtin();
        for (worker, patch) in load_capability_overrides(working_dir) {
            debug!("Loaded capability override for {}", worker);
            registry.apply(worker, &patch);
        }
        registry
    }

    /// Bind a tool set and instructions to a worker, replacing any
    /// previous binding
    pub fn register(
        &mut self,
        worker: WorkerId,
        tools: impl IntoIterator<Item = impl Into<String>>,
        instructions: impl Into<String>,
    ) {
        let description = self
            .capabilities
            .get(&worker)
            .map(|c| c.description.clone())
            .unwrap_or_default();
        let capability = tools
            .into_iter()
            .fold(Capability::new(description), |cap, tool| cap.with_tool(tool))
            .with_instructions(instructions);
        self.capabilities.insert(worker, capability);
    }

    pub fn register_capability(&mut self, worker: WorkerId, capability: Capability) {
        self.capabilities.insert(worker, capability);
    }

    /// Patch an existing binding; unknown workers get a fresh one
    pub fn apply(&mut self, worker: WorkerId, patch: &CapabilityOverride) {
        match self.capabilities.get_mut(&worker) {
            Some(current) => *current = current.clone().merged(patch),
            None => {
                self.capabilities
                    .insert(worker, Capability::new("").merged(patch));
            }
        }
    }

    pub fn resolve(&self, worker: WorkerId) -> Result<&Capability, RegistryError> {
        self.capabilities
            .get(&worker)
            .ok_or_else(|| RegistryError::UnknownWorker(worker.as_str().to_string()))
    }

    pub fn contains(&self, worker: WorkerId) -> bool {
        self.capabilities.contains_key(&worker)
    }

    /// Registered workers in registration order
    pub fn workers(&self) -> impl Iterator<Item = (WorkerId, &Capability)> {
        self.capabilities.iter().map(|(id, cap)| (*id, cap))
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Every bound tool must exist in the tool registry
    pub fn validate(&self, tools: &ToolRegistry) -> Result<(), RegistryError> {
        for (worker, capability) in self.workers() {
            if let Some(missing) = capability.tools.iter().find(|t| !tools.contains(t)) {
                return Err(RegistryError::UnknownTool {
                    worker,
                    tool: missing.clone(),
                });
            }
        }
        Ok(())
    }
}
