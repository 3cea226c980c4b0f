//! Enumeration of candidate assignments for a subset of variables.
//!
//! [`tables::AssignmentsTable`] implementations decide which assignments a
//! clique considers; [`filters::SubsetFilterTable`] implementations prune them
//! while they are generated. All enumeration follows the canonical order of
//! [`cartesian::CartesianIter`], so truncation at a quota is deterministic.

pub mod cartesian;
pub mod filters;
pub mod tables;
