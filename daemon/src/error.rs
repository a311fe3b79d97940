use crate::residence::RetainerId;
use formula_graph::FormulaId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DaemonError {
    #[error("{0} is not a pet store")]
    UnknownPetStore(FormulaId),
    #[error("invalid pet name {0:?}")]
    InvalidPetName(String),
    #[error("formula does not exist for pet name {0:?}")]
    MissingName(String),
    #[error("unknown retainer {0}")]
    UnknownRetainer(RetainerId),
}
