//! Trajectory predicate engine.
//!
//! This crate provides:
//! - Predicates over object tracks (start/end, point set, waypoint, any-of)
//! - Predecessor lookups used by accuracy estimation and refinement
//! - An explicit, read-only registry of named queries
//! - The built-in traffic-camera query catalogue
//! - JSON predicate definitions for dataset-specific queries

pub mod builtin;
pub mod definition;
pub mod error;
pub mod predicate;
pub mod registry;

pub use definition::{PredicateBody, PredicateDef, RegionDef};
pub use error::{PredicateError, PredicateResult};
pub use predicate::{predecessor_by_distance, predecessor_by_time, Predicate};
pub use builtin::register_builtin;
pub use registry::{PredicateRegistry, RegistryBuilder};
