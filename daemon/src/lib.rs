//! Drives a [`FormulaGraph`](formula_graph::FormulaGraph) the way a daemon
//! does: every formula, pet name and live session goes through one
//! [`Daemon`], which decides when to collect and tears down what a pass
//! removes.

#[macro_use]
extern crate log;

mod daemon;
mod error;
pub mod pet_store;
pub mod residence;
mod settings;

pub use daemon::{Collection, Daemon};
pub use error::DaemonError;
pub use pet_store::PetStore;
pub use residence::{Closed, Disconnect, ResidenceTracker, Retainer, RetainerId, Teardown};
pub use settings::CollectorSettings;
