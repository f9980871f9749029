//! URL layout of the engine's management API and ingestion endpoint

use crate::common::config::EngineConfig;

/// Resolved URLs for one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    management: String,
    ingest: String,
}

impl Endpoints {
    pub fn new(management_url: &str, ingest_url: &str) -> Self {
        Self {
            management: management_url.trim_end_matches('/').to_string(),
            ingest: ingest_url.to_string(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.management_url, &config.ingest_url)
    }

    /// Readiness probe
    pub fn status(&self) -> String {
        format!("{}/flow/status", self.management)
    }

    /// Root process group resource
    pub fn root_group(&self) -> String {
        format!("{}/process-groups/root", self.management)
    }

    /// Flow contents of the root group. Always root-relative, never addressed by id.
    pub fn root_flow_contents(&self) -> String {
        format!("{}/process-groups/root/flow-contents", self.management)
    }

    /// Run-state resource of a process group
    pub fn group_state(&self, group_id: &str) -> String {
        format!("{}/flow/process-groups/{}", self.management, group_id)
    }

    pub fn counters(&self) -> String {
        format!("{}/counters", self.management)
    }

    pub fn ingest(&self) -> &str {
        &self.ingest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_management_api_layout() {
        let endpoints = Endpoints::new("http://localhost:8080/nifi-api/", "http://localhost:8081/testInput");

        assert_eq!(endpoints.status(), "http://localhost:8080/nifi-api/flow/status");
        assert_eq!(endpoints.root_group(), "http://localhost:8080/nifi-api/process-groups/root");
        assert_eq!(
            endpoints.root_flow_contents(),
            "http://localhost:8080/nifi-api/process-groups/root/flow-contents"
        );
        assert_eq!(
            endpoints.group_state("abc-123"),
            "http://localhost:8080/nifi-api/flow/process-groups/abc-123"
        );
        assert_eq!(endpoints.counters(), "http://localhost:8080/nifi-api/counters");
        assert_eq!(endpoints.ingest(), "http://localhost:8081/testInput");
    }
}
