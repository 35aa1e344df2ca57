//! Allocation Engine (spec §4.D): propagates raw costs up the dependency graph one
//! `(date, dimension)` unit at a time.

mod engine;
mod weights;

pub use engine::{allocate_unit, UnitResult};
