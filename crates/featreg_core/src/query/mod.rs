//! List filters over registry objects.
//!
//! # Responsibility
//! - Evaluate conjunctive list filters (labels, entities, names) in memory
//!   over scanned repository contents.
//!
//! # Invariants
//! - An empty filter field constrains nothing.
//! - A filter that matches nothing yields an empty result, never an error.

pub mod filter;
