//! Agent catalog collaborators.
use crate::access::AgentDescriptor;
use crate::errors::{CatalogError, ConfigError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// Source of the agents a deployment exposes.
#[async_trait]
pub trait AgentCatalog: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<AgentDescriptor>, CatalogError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Bare(Vec<AgentDescriptor>),
    Wrapped { agents: Vec<AgentDescriptor> },
}

/// Fixed agent list, loaded once.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    agents: Vec<AgentDescriptor>,
}

impl StaticCatalog {
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self { agents }
    }

    /// Accepts either a JSON array of agents or `{"agents": [...]}`.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let document: CatalogDocument =
            serde_json::from_str(raw).map_err(|err| ConfigError::ParseFailure(err.to_string()))?;
        let agents = match document {
            CatalogDocument::Bare(agents) | CatalogDocument::Wrapped { agents } => agents,
        };
        Ok(Self::new(agents))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    source: err,
                }
            }
        })?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), agents = catalog.agents.len(), "loaded agent catalog");
        Ok(catalog)
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn find(&self, name: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|agent| agent.name == name)
    }
}

#[async_trait]
impl AgentCatalog for StaticCatalog {
    async fn list_agents(&self) -> Result<Vec<AgentDescriptor>, CatalogError> {
        Ok(self.agents.clone())
    }
}
