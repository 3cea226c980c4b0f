//! The junction tree and its parts.
//!
//! [`node::CliqueNode`] holds a clique's enumerated assignments and scores,
//! [`edge::SeparatorEdge`] carries messages between adjacent cliques, and
//! [`junction::JunctionTree`] drives the lifecycle from enumeration to the
//! reconstruction of optimal assignments.

pub mod edge;
pub mod junction;
pub mod node;
