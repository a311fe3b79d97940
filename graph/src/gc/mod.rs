//! Grouped collection of formulas.
//!
//! A pass projects the formula graph onto groups and colors each group:
//!
//! | color  | meaning                                   |
//! | ------ | ----------------------------------------- |
//! | Black  | in use, or not yet looked at              |
//! | Purple | survived the acyclic phase, may be garbage |
//! | Gray   | trial-decremented, member of some cycle   |
//! | White  | member of a garbage cycle                 |
//!
//! Groups nothing references are freed first, in a worklist closure. The
//! survivors then go through trial deletion, which finds the cycles that
//! only keep themselves alive.

mod collector;
mod graph;
mod trace;
mod union_find;
mod utils;

pub use graph::{ExtractDeps, FormulaGraph, IsLocalId};
pub use trace::{Trace, TracerFn};
pub use utils::CollectResult;
