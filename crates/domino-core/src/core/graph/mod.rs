//! # Graph Module
//!
//! Structure discovery for exact inference: which variables interact, and how
//! to arrange them into a tree of cliques that satisfies the running
//! intersection property.
//!
//! ## Key Components
//!
//! - [`interaction`] - The interaction graph induced by restraints
//! - [`builder`] - Triangulation, maximal cliques and the maximum spanning clique tree
//! - [`description`] - Hand-written junction tree layouts loaded from TOML

pub mod builder;
pub mod description;
pub mod interaction;

use crate::core::models::subset::Subset;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("The interaction graph has no variables")]
    Empty,
    #[error(
        "The interaction graph is disconnected ({components} components); connect the components explicitly before building a junction tree"
    )]
    Disconnected { components: usize },
    #[error("Unknown variable '{0}' in junction tree description")]
    UnknownVariable(String),
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Cliques and the tree edges connecting them, by clique index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JunctionTreeLayout {
    pub cliques: Vec<Subset>,
    pub edges: Vec<(usize, usize)>,
}
