//! Flow deployment
//!
//! Installs a flow definition into the engine's root process group and
//! switches the group to RUNNING.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::client::EngineClient;
use super::endpoints::Endpoints;
use crate::common::{Error, Result};

/// Client identifier sent with every revision
pub const REVISION_CLIENT_ID: &str = "root";

/// An opaque flow document, passed through to the engine unmodified
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDefinition(Value);

impl FlowDefinition {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    /// Load a flow definition from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let document = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Flow definition '{}' is not valid JSON: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self(document))
    }

    pub fn document(&self) -> &Value {
        &self.0
    }
}

/// Revision descriptor expected by the flow-contents resource
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub client_id: String,
    pub version: u64,
}

/// Request body for uploading a flow into a process group
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEnvelope<'a> {
    pub process_group_revision: Revision,
    pub versioned_flow_snapshot: &'a Value,
}

/// Wrap a flow definition in a fresh envelope at revision 0
pub fn wrap(flow: &FlowDefinition) -> DeploymentEnvelope<'_> {
    DeploymentEnvelope {
        process_group_revision: Revision {
            client_id: REVISION_CLIENT_ID.to_string(),
            version: 0,
        },
        versioned_flow_snapshot: flow.document(),
    }
}

#[derive(Debug, Serialize)]
struct ScheduleRequest<'a> {
    id: &'a str,
    state: &'static str,
}

/// Deploys and starts flows against one engine
pub struct FlowDeployer<'a> {
    client: &'a EngineClient,
    endpoints: &'a Endpoints,
    start_settle: Duration,
}

impl<'a> FlowDeployer<'a> {
    pub fn new(client: &'a EngineClient, endpoints: &'a Endpoints, start_settle: Duration) -> Self {
        Self {
            client,
            endpoints,
            start_settle,
        }
    }

    /// Identifier of the topmost process group
    pub async fn get_root_id(&self) -> Result<String> {
        let url = self.endpoints.root_group();
        let body = self.client.fetch(&url).await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::malformed(&url, "missing string field 'id'"))
    }

    /// Upload an envelope into the root group
    ///
    /// The flow-contents resource addresses the root group by name, so
    /// `root_id` is only used for logging.
    pub async fn deploy(&self, root_id: &str, envelope: &DeploymentEnvelope<'_>) -> Result<()> {
        tracing::info!(root_id, "uploading flow definition");
        self.client
            .put(&self.endpoints.root_flow_contents(), envelope)
            .await?;
        Ok(())
    }

    /// Schedule every component under `root_id`, then wait for the settle delay
    pub async fn start(&self, root_id: &str) -> Result<()> {
        let request = ScheduleRequest {
            id: root_id,
            state: "RUNNING",
        };
        let response = self
            .client
            .put(&self.endpoints.group_state(root_id), &request)
            .await?;
        tracing::debug!(response = %response, "start flow response");

        // The engine schedules asynchronously; reads right after this may
        // still see the old state.
        tokio::time::sleep(self.start_settle).await;
        Ok(())
    }
}
