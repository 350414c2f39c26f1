//! Trip Planner - a multi-agent travel planning supervisor
//!
//! This crate provides:
//! - A supervisor loop that routes between five single-purpose workers
//!   (info collection, search, planner, calendar, share)
//! - A model-backed router with a deterministic rule router as fallback
//! - Collaborator traits for search, place lookup, calendar and publishing
//! - CLI/REPL interface for interactive planning

pub mod agent;
pub mod artifact;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod facts;
pub mod intent;
pub mod provider;
pub mod services;
pub mod state;
pub mod supervisor;
pub mod telemetry;
pub mod templates;
pub mod tool;
pub mod tools;
pub mod trip;

#[cfg(test)]
mod test_support;

pub use agent::{CapabilityRegistry, Worker, WorkerId, WorkerResult};
pub use auth::AuthConfig;
pub use config::Config;
pub use error::PlannerError;
pub use events::RunEvent;
pub use provider::{ChatModel, ProviderClient, ProviderConfig};
pub use services::Services;
pub use state::{Conversation, Turn};
pub use supervisor::{RoutingDecision, RoutingPolicy, RunStatus};
pub use telemetry::Telemetry;
pub use trip::{SubmitResponse, TravelPlanner, TravelPlannerBuilder, WorkflowRun};
