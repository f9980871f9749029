//! Remote collaborators of the flow engine
//!
//! Everything here talks HTTP to the engine's management API or its
//! data-ingestion endpoint. None of it knows about containers.

pub mod client;
pub mod counter;
pub mod deployer;
pub mod endpoints;
pub mod readiness;

pub use client::EngineClient;
pub use counter::{evaluate, CounterKey, CounterValue, CounterVerifier, RunOutcome};
pub use deployer::{wrap, DeploymentEnvelope, FlowDefinition, FlowDeployer};
pub use endpoints::Endpoints;
pub use readiness::{wait_until_ready, Readiness, ReadinessProbe, StatusProbe};
