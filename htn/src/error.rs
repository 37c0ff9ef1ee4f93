use thiserror::Error;

use crate::{PredicateId, TaskId};

/// Registration and configuration errors.
///
/// Runtime failures while planning or executing are reported through `Plan::failed`, never
/// through this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HtnError {
    #[error("task `{0}` is already registered")]
    DuplicateTask(TaskId),

    #[error("task `{0}` is not registered")]
    UnknownTask(TaskId),

    #[error("abstract task `{0}` has no implementations")]
    EmptyAbstract(TaskId),

    #[error("task `{task}` references unregistered predicate `{predicate}`")]
    MissingPredicate { task: TaskId, predicate: PredicateId },

    #[error("unknown world fact `{0}`")]
    UnknownFact(String),
}

pub type Result<T, E = HtnError> = std::result::Result<T, E>;
