//! Capability configuration types
//!
//! A capability is what a worker is allowed to do: the closed set of tools
//! it may call and the behavioural instructions it runs under.

use serde::{Deserialize, Serialize};

/// Tool set and instructions bound to one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Short description, shown to the routing model
    #[serde(default)]
    pub description: String,

    /// Tool names this worker may call
    #[serde(default)]
    pub tools: Vec<String>,

    /// Behavioural instructions
    #[serde(default)]
    pub instructions: String,
}

impl Capability {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tools: Vec::new(),
            instructions: String::new(),
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.tools.contains(&name) {
            self.tools.push(name);
        }
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Apply a YAML override on top of this capability
    pub fn merged(mut self, patch: &CapabilityOverride) -> Self {
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(tools) = &patch.tools {
            self.tools = tools.clone();
        }
        for tool in &patch.add_tools {
            self = self.with_tool(tool.clone());
        }
        self.tools.retain(|t| !patch.remove_tools.contains(t));
        if let Some(instructions) = &patch.instructions {
            self.instructions = instructions.clone();
        }
        self
    }
}

/// Partial capability loaded from a worker YAML file
///
/// ```yaml
/// description: Finds places and web results
/// add_tools: [place_lookup]
/// remove_tools: [web_search]
/// instructions: |
///   Prefer official tourism sites.
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Replaces the tool set entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}
