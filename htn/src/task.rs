use core::fmt;
use std::sync::Arc;

use htn_core::{Vec3, WorldQuerier, WorldState};

use crate::Condition;

/// Identifier of a task registered in a [`crate::TaskDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub &'static str);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Identifier of a predicate registered in a [`crate::PredicateRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PredicateId(pub &'static str);

impl fmt::Display for PredicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone)]
pub enum TaskKind<A> {
    /// A primitive step; the backend performs `action`.
    Simple { action: A },
    /// Runs `subtasks` in order.
    Compound { subtasks: Vec<Task<A>> },
    /// Placeholder for one of several registered implementations.
    Abstract,
    /// Runs `subtasks` again until the task's postconditions hold, at most `max_repeats` extra
    /// times.
    Recursive { subtasks: Vec<Task<A>>, max_repeats: u32 },
}

/// Per-instance scratch storage, addressed by index from hooks and predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskParameters {
    pub vectors: Vec<Vec3>,
    pub values: Vec<f32>,
    pub flags: Vec<bool>,
}

pub type SetupFn<A> = Arc<dyn Fn(&mut Task<A>, &mut WorldState, &dyn WorldQuerier) + Send + Sync>;
pub type LoopFn<A> = Arc<dyn Fn(&mut WorldState, &dyn WorldQuerier, &mut Task<A>) + Send + Sync>;
pub type FinishFn<A> = Arc<dyn Fn(&mut WorldState, &mut Task<A>) + Send + Sync>;
pub type FinallyFn = Arc<dyn Fn(&mut WorldState) + Send + Sync>;

pub struct TaskHooks<A> {
    /// Runs once when the task becomes current.
    pub setup: Option<SetupFn<A>>,
    /// Runs every tick the task is evaluated.
    pub on_loop: Option<LoopFn<A>>,
    /// Runs when the task completes.
    pub finish: Option<FinishFn<A>>,
    /// Cleanup; runs at most once per plan for tasks that were started.
    pub finally: Option<FinallyFn>,
}

impl<A> Default for TaskHooks<A> {
    fn default() -> Self {
        Self {
            setup: None,
            on_loop: None,
            finish: None,
            finally: None,
        }
    }
}

impl<A> Clone for TaskHooks<A> {
    fn clone(&self) -> Self {
        Self {
            setup: self.setup.clone(),
            on_loop: self.on_loop.clone(),
            finish: self.finish.clone(),
            finally: self.finally.clone(),
        }
    }
}

impl<A> fmt::Debug for TaskHooks<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHooks")
            .field("setup", &self.setup.is_some())
            .field("loop", &self.on_loop.is_some())
            .field("finish", &self.finish.is_some())
            .field("finally", &self.finally.is_some())
            .finish()
    }
}

/// A task definition, and (once flattened into a [`crate::Plan`]) a task instance.
#[derive(Debug, Clone)]
pub struct Task<A> {
    pub name: &'static str,
    /// Set when the task is registered.
    pub id: Option<TaskId>,
    pub kind: TaskKind<A>,
    pub preconditions: Condition,
    pub postconditions: Condition,
    /// Alternative completion test for simple tasks; ignored when empty.
    pub break_conditions: Condition,
    /// Fail instead of waiting when not complete after one evaluation.
    pub is_immediate: bool,
    pub parameters: TaskParameters,
    pub hooks: TaskHooks<A>,

    // Plan-instance bookkeeping.
    pub parent: Option<usize>,
    pub last_child: bool,
    pub started: bool,
    /// Set by the first `setup`; survives the rewind of a recursive block.
    pub ever_started: bool,
    pub finalized: bool,
    pub failed: bool,
    pub remaining_repeats: u32,
    /// Index into `Plan::plan_path` of the vertex this instance was flattened from.
    pub path_vertex: usize,
}

impl<A> Task<A> {
    fn with_kind(name: &'static str, kind: TaskKind<A>) -> Self {
        Self {
            name,
            id: None,
            kind,
            preconditions: Condition::default(),
            postconditions: Condition::default(),
            break_conditions: Condition::default(),
            is_immediate: false,
            parameters: TaskParameters::default(),
            hooks: TaskHooks::default(),
            parent: None,
            last_child: false,
            started: false,
            ever_started: false,
            finalized: false,
            failed: false,
            remaining_repeats: 0,
            path_vertex: 0,
        }
    }

    pub fn simple(name: &'static str, action: A) -> Self {
        Self::with_kind(name, TaskKind::Simple { action })
    }

    pub fn compound(name: &'static str, subtasks: Vec<Task<A>>) -> Self {
        Self::with_kind(name, TaskKind::Compound { subtasks })
    }

    pub fn abstract_task(name: &'static str) -> Self {
        Self::with_kind(name, TaskKind::Abstract)
    }

    pub fn recursive(name: &'static str, subtasks: Vec<Task<A>>, max_repeats: u32) -> Self {
        Self::with_kind(
            name,
            TaskKind::Recursive {
                subtasks,
                max_repeats,
            },
        )
    }

    pub fn with_preconditions(mut self, condition: Condition) -> Self {
        self.preconditions = condition;
        self
    }

    pub fn with_postconditions(mut self, condition: Condition) -> Self {
        self.postconditions = condition;
        self
    }

    pub fn with_break_conditions(mut self, condition: Condition) -> Self {
        self.break_conditions = condition;
        self
    }

    pub fn with_parameters(mut self, parameters: TaskParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.is_immediate = true;
        self
    }

    pub fn on_setup(
        mut self,
        f: impl Fn(&mut Task<A>, &mut WorldState, &dyn WorldQuerier) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.setup = Some(Arc::new(f));
        self
    }

    pub fn on_loop(
        mut self,
        f: impl Fn(&mut WorldState, &dyn WorldQuerier, &mut Task<A>) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_loop = Some(Arc::new(f));
        self
    }

    pub fn on_finish(
        mut self,
        f: impl Fn(&mut WorldState, &mut Task<A>) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.finish = Some(Arc::new(f));
        self
    }

    pub fn on_finally(mut self, f: impl Fn(&mut WorldState) + Send + Sync + 'static) -> Self {
        self.hooks.finally = Some(Arc::new(f));
        self
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.kind, TaskKind::Simple { .. })
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TaskKind::Abstract)
    }

    pub fn action(&self) -> Option<&A> {
        match &self.kind {
            TaskKind::Simple { action } => Some(action),
            _ => None,
        }
    }

    pub fn subtasks(&self) -> &[Task<A>] {
        match &self.kind {
            TaskKind::Compound { subtasks } | TaskKind::Recursive { subtasks, .. } => subtasks,
            TaskKind::Simple { .. } | TaskKind::Abstract => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TaskKind::Simple { .. } => "simple",
            TaskKind::Compound { .. } => "compound",
            TaskKind::Abstract => "abstract",
            TaskKind::Recursive { .. } => "recursive",
        }
    }

    /// Mark started and run `setup`; no-op when already started.
    pub(crate) fn start(&mut self, state: &mut WorldState, querier: &dyn WorldQuerier) {
        if self.started {
            return;
        }
        self.started = true;
        self.ever_started = true;
        if let Some(setup) = self.hooks.setup.clone() {
            setup(self, state, querier);
        }
    }

    pub(crate) fn run_loop(&mut self, state: &mut WorldState, querier: &dyn WorldQuerier) {
        if let Some(on_loop) = self.hooks.on_loop.clone() {
            on_loop(state, querier, self);
        }
    }

    pub(crate) fn run_finish(&mut self, state: &mut WorldState) {
        if let Some(finish) = self.hooks.finish.clone() {
            finish(state, self);
        }
    }

    /// Run `finally` if the task was ever started and has not been finalized yet.
    pub(crate) fn run_finally(&mut self, state: &mut WorldState) {
        if !self.ever_started || self.finalized {
            return;
        }
        self.finalized = true;
        if let Some(finally) = self.hooks.finally.clone() {
            finally(state);
        }
    }
}
