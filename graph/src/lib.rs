//! Dependency graph and collector for formulas.
//!
//! The host registers formulas, pet names and roots with a [`FormulaGraph`]
//! and runs [`FormulaGraph::collect`] to learn which formulas nothing can
//! reach anymore.

#[macro_use]
extern crate log;
// lets `#[derive(Trace)]` name this crate from inside it
extern crate self as formula_graph;

pub mod formula;
pub mod gc;

pub use formula::{Formula, FormulaId, IdError};
pub use gc::{CollectResult, FormulaGraph};
