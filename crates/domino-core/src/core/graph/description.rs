use super::{GraphError, JunctionTreeLayout};
use crate::core::models::subset::Subset;
use crate::core::models::variable::VariableRegistry;
use serde::Deserialize;
use std::path::Path;

/// A junction tree written out by hand.
///
/// ```toml
/// nodes = [["A", "B"], ["B", "C"]]
/// edges = [[0, 1]]
/// ```
///
/// Nodes list variables by registry name; edges refer to nodes by position.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JunctionTreeDescription {
    pub nodes: Vec<Vec<String>>,
    #[serde(default)]
    pub edges: Vec<[usize; 2]>,
}

impl JunctionTreeDescription {
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path).map_err(|e| GraphError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| GraphError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, GraphError> {
        toml::from_str(content).map_err(|e| GraphError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })
    }

    /// Resolves variable names against `registry`.
    ///
    /// Topology checks (index ranges, self loops, duplicates) are left to the
    /// junction tree, which reports them with node context.
    pub fn resolve(&self, registry: &VariableRegistry) -> Result<JunctionTreeLayout, GraphError> {
        let cliques = self
            .nodes
            .iter()
            .map(|names| {
                names
                    .iter()
                    .map(|name| {
                        registry
                            .find_by_name(name)
                            .ok_or_else(|| GraphError::UnknownVariable(name.clone()))
                    })
                    .collect::<Result<Subset, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let edges = self.edges.iter().map(|&[a, b]| (a, b)).collect();
        Ok(JunctionTreeLayout { cliques, edges })
    }
}
