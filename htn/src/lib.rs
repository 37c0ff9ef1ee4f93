//! Hierarchical task network planning for game characters.
//!
//! A [`TaskDatabase`] holds task definitions and the graph of which task can satisfy which.
//! [`generate_plan`] searches that graph backwards from a goal and flattens the result into a
//! [`Plan`]; [`evaluate_plan`] advances it once per tick; [`fix_failed_plan`] swaps in another
//! implementation of an abstract task when execution fails. [`HtnDriver`] ties these together
//! for one character.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod condition;
pub mod database;
pub mod driver;
pub mod error;
pub mod execution;
pub mod plan;
pub mod planner;
pub mod predicate;
pub mod repair;
pub mod satisfy;
pub mod task;

pub use condition::{
    Condition, ConditionOp, MergedCondition, MergedPredicate, PredicateClause, RequiredFlag,
    RequiredValue,
};
pub use database::{are_adjacent, TaskDatabase, TaskVertex};
pub use driver::{
    ActionBackend, DriverConfig, GoalHistory, GoalSelector, HtnDriver, RankedGoal, TickInputs,
};
pub use error::{HtnError, Result};
pub use execution::{evaluate_plan, execute_finally};
pub use plan::Plan;
pub use planner::{generate_plan, PlannerConfig};
pub use predicate::{PredicateFn, PredicateRegistry};
pub use repair::fix_failed_plan;
pub use satisfy::can_satisfy;
pub use task::{
    FinallyFn, FinishFn, LoopFn, PredicateId, SetupFn, Task, TaskHooks, TaskId, TaskKind,
    TaskParameters,
};
