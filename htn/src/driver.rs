use std::collections::VecDeque;

use htn_core::{TickContext, WorldQuerier, WorldState};
use htn_tools::{TraceEvent, TraceLog, TraceRecorder, TraceSink};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    evaluate_plan, execute_finally, fix_failed_plan, generate_plan, Plan, PlannerConfig,
    PredicateRegistry, Task, TaskDatabase, TaskId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriverConfig {
    /// Number of past goals remembered for repeat considerations.
    pub history_len: usize,

    /// Optional budget to prevent endless restarts of the same goal.
    ///
    /// Counts consecutive plan starts for one goal. When exceeded, the driver plans for the
    /// fallback goal instead until a different goal is started. The fallback goal itself is not
    /// limited.
    pub max_plan_starts_per_goal: Option<u32>,

    pub planner: PlannerConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            history_len: 10,
            max_plan_starts_per_goal: None,
            planner: PlannerConfig::default(),
        }
    }
}

/// A candidate goal and its utility score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedGoal {
    pub goal: TaskId,
    pub score: f32,
}

/// Most recent goals, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalHistory {
    goals: VecDeque<TaskId>,
    capacity: usize,
}

impl GoalHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            goals: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, goal: TaskId) {
        if self.capacity == 0 {
            return;
        }
        if self.goals.len() == self.capacity {
            self.goals.pop_front();
        }
        self.goals.push_back(goal);
    }

    /// How many goals ago `goal` was last chosen (1 = most recent); the capacity if it is not in the
    /// history.
    pub fn distance_since(&self, goal: TaskId) -> usize {
        self.goals
            .iter()
            .rev()
            .position(|g| *g == goal)
            .map_or(self.capacity, |i| i + 1)
    }

    pub fn last(&self) -> Option<TaskId> {
        self.goals.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.goals.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

/// Decides which goal a character should pursue.
pub trait GoalSelector {
    /// Candidate goals, highest score first.
    fn rank_goals(&mut self, state: &WorldState, history: &GoalHistory) -> Vec<RankedGoal>;
}

/// Performs the action of the current simple task.
pub trait ActionBackend<A> {
    fn perform(
        &mut self,
        ctx: &TickContext,
        task: &mut Task<A>,
        state: &mut WorldState,
        querier: &dyn WorldQuerier,
    );
}

/// Everything the driver needs from the outside world for one tick.
pub struct TickInputs<'a, A> {
    pub state: &'a mut WorldState,
    pub querier: &'a dyn WorldQuerier,
    pub database: &'a TaskDatabase<A>,
    pub predicates: &'a PredicateRegistry<A>,
}

/// Per-character controller: picks goals, plans, repairs, and executes one tick at a time.
///
/// Each tick runs `decide` (replan when there is no plan or it finished, repair or fall back when it
/// failed), hands the current task to the [`ActionBackend`], then advances the plan.
#[derive(Debug)]
pub struct HtnDriver<A> {
    config: DriverConfig,
    fallback_goal: Option<TaskId>,
    plan: Plan<A>,
    current_goal: Option<TaskId>,
    ranked: Vec<RankedGoal>,
    next_ranked: usize,
    history: GoalHistory,
    trace: TraceRecorder,
    tick: u64,

    plan_calls: u64,
    plan_starts: u64,
    starts_for_goal: u32,
    last_started_goal: Option<TaskId>,
    last_plan_len: Option<usize>,
}

impl<A: Clone> HtnDriver<A> {
    pub fn new() -> Self {
        let config = DriverConfig::default();
        Self {
            history: GoalHistory::new(config.history_len),
            config,
            fallback_goal: None,
            plan: Plan::default(),
            current_goal: None,
            ranked: Vec::new(),
            next_ranked: 0,
            trace: TraceRecorder::new(),
            tick: 0,
            plan_calls: 0,
            plan_starts: 0,
            starts_for_goal: 0,
            last_started_goal: None,
            last_plan_len: None,
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.history = GoalHistory::new(config.history_len);
        self.config = config;
        self
    }

    /// Goal planned for when nothing else works (the idle task).
    pub fn with_fallback_goal(mut self, goal: TaskId) -> Self {
        self.fallback_goal = Some(goal);
        self
    }

    /// Record trace events in memory (see [`HtnDriver::trace_log`]).
    pub fn with_trace_log(mut self) -> Self {
        self.trace = self.trace.with_log();
        self
    }

    pub fn with_trace_sink(mut self, sink: impl TraceSink + Send + 'static) -> Self {
        self.trace = self.trace.with_sink(sink);
        self
    }

    pub fn plan(&self) -> &Plan<A> {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut Plan<A> {
        &mut self.plan
    }

    pub fn current_goal(&self) -> Option<TaskId> {
        self.current_goal
    }

    pub fn history(&self) -> &GoalHistory {
        &self.history
    }

    pub fn trace_log(&self) -> Option<&TraceLog> {
        self.trace.log()
    }

    pub fn take_trace_log(&mut self) -> Option<TraceLog> {
        self.trace.take_log()
    }

    /// Number of times the planner was invoked.
    pub fn plan_calls(&self) -> u64 {
        self.plan_calls
    }

    /// Number of plans that started executing.
    pub fn plan_starts(&self) -> u64 {
        self.plan_starts
    }

    pub fn last_plan_len(&self) -> Option<usize> {
        self.last_plan_len
    }

    /// decide → perform → evaluate.
    pub fn tick(
        &mut self,
        ctx: &TickContext,
        inputs: TickInputs<'_, A>,
        selector: &mut dyn GoalSelector,
        backend: &mut dyn ActionBackend<A>,
    ) {
        let TickInputs {
            state,
            querier,
            database,
            predicates,
        } = inputs;
        self.tick = ctx.tick;

        self.decide(state, querier, database, predicates, selector);

        if !self.plan.failed && !self.plan.finished {
            if let Some(task) = self.plan.current_task_mut() {
                if task.is_simple() {
                    backend.perform(ctx, task, state, querier);
                }
            }
        }

        let was_failed = self.plan.failed;
        let was_finished = self.plan.finished;
        evaluate_plan(&mut self.plan, state, querier, predicates);

        if self.plan.failed && !was_failed {
            let name = self.plan.current_task().map_or("", |t| t.name);
            self.emit(
                TraceEvent::new(self.tick, "htn.plan.failed")
                    .with_a(self.plan.cursor() as u64)
                    .with_task(name),
            );
        }
        if self.plan.finished && !was_finished {
            self.emit(
                TraceEvent::new(self.tick, "htn.plan.finished")
                    .with_a(self.plan.len() as u64)
                    .with_task(self.goal_name()),
            );
        }
    }

    /// Abandon the current plan and plan for `goal` right away.
    pub fn set_goal(
        &mut self,
        goal: TaskId,
        state: &mut WorldState,
        querier: &dyn WorldQuerier,
        database: &TaskDatabase<A>,
        predicates: &PredicateRegistry<A>,
    ) {
        execute_finally(&mut self.plan, state);
        self.ranked.clear();
        self.next_ranked = 0;
        self.change_goal(goal, querier);
        self.create_plan(goal, state, querier, database, predicates);
    }

    /// Plan for `goal`, falling back to the fallback goal when no plan is found.
    pub fn create_plan(
        &mut self,
        goal: TaskId,
        state: &mut WorldState,
        querier: &dyn WorldQuerier,
        database: &TaskDatabase<A>,
        predicates: &PredicateRegistry<A>,
    ) {
        if Some(goal) != self.fallback_goal && self.would_exceed_budget(goal) {
            self.emit(TraceEvent::new(self.tick, "htn.plan.budget_exhausted").with_task(goal.0));
            warn!(agent = querier.name(), goal = goal.0, "plan start budget exhausted");
            self.plan = Plan::failed_for(goal);
            self.plan_fallback(goal, state, querier, database, predicates);
            return;
        }

        self.plan_calls = self.plan_calls.saturating_add(1);
        self.emit(TraceEvent::new(self.tick, "htn.plan.call").with_task(goal.0));
        let plan = generate_plan(goal, state, querier, database, predicates, &self.config.planner);
        self.emit(
            TraceEvent::new(self.tick, "htn.plan.result")
                .with_a(plan.len() as u64)
                .with_b(u64::from(plan.failed))
                .with_task(goal.0),
        );

        self.plan = plan;
        if self.plan.failed {
            self.plan_fallback(goal, state, querier, database, predicates);
            return;
        }

        self.note_plan_start(goal);
        info!(
            agent = querier.name(),
            goal = goal.0,
            tasks = self.plan.len(),
            "started plan"
        );
        self.emit(
            TraceEvent::new(self.tick, "htn.plan.start")
                .with_a(self.plan.len() as u64)
                .with_task(goal.0),
        );
    }

    fn plan_fallback(
        &mut self,
        failed_goal: TaskId,
        state: &mut WorldState,
        querier: &dyn WorldQuerier,
        database: &TaskDatabase<A>,
        predicates: &PredicateRegistry<A>,
    ) {
        match self.fallback_goal {
            Some(fallback) if fallback != failed_goal => {
                debug!(
                    agent = querier.name(),
                    goal = failed_goal.0,
                    fallback = fallback.0,
                    "no plan, falling back"
                );
                self.emit(TraceEvent::new(self.tick, "htn.plan.fallback").with_task(fallback.0));
                self.create_plan(fallback, state, querier, database, predicates);
            }
            _ => {
                warn!(agent = querier.name(), goal = failed_goal.0, "no plan and no fallback");
            }
        }
    }

    fn decide(
        &mut self,
        state: &mut WorldState,
        querier: &dyn WorldQuerier,
        database: &TaskDatabase<A>,
        predicates: &PredicateRegistry<A>,
        selector: &mut dyn GoalSelector,
    ) {
        if self.plan.finished || self.plan.is_empty() {
            execute_finally(&mut self.plan, state);

            self.ranked = selector.rank_goals(state, &self.history);
            self.next_ranked = 1;
            let goal = match self.ranked.first() {
                Some(top) => top.goal,
                None => match self.fallback_goal {
                    Some(fallback) => fallback,
                    None => return,
                },
            };

            self.change_goal(goal, querier);
            self.create_plan(goal, state, querier, database, predicates);
            return;
        }

        if !self.plan.failed {
            return;
        }

        if fix_failed_plan(&mut self.plan, state, database, predicates) {
            let name = self.plan.current_task().map_or("", |t| t.name);
            self.emit(
                TraceEvent::new(self.tick, "htn.plan.repaired")
                    .with_a(self.plan.cursor() as u64)
                    .with_task(name),
            );
            return;
        }

        execute_finally(&mut self.plan, state);

        let next = self.ranked.get(self.next_ranked).copied();
        self.next_ranked = self.next_ranked.saturating_add(1);
        match next {
            Some(candidate) if candidate.score > 0.0 => {
                self.change_goal(candidate.goal, querier);
                self.create_plan(candidate.goal, state, querier, database, predicates);
            }
            _ => {
                let Some(fallback) = self.fallback_goal else {
                    // Nothing to fall back to: start over with a fresh selection next tick.
                    self.plan = Plan::default();
                    return;
                };
                self.change_goal(fallback, querier);
                self.create_plan(fallback, state, querier, database, predicates);
            }
        }
    }

    fn change_goal(&mut self, goal: TaskId, querier: &dyn WorldQuerier) {
        if self.current_goal != Some(goal) {
            info!(agent = querier.name(), goal = goal.0, "new goal");
            self.emit(TraceEvent::new(self.tick, "htn.goal.changed").with_task(goal.0));
        }
        self.current_goal = Some(goal);
        self.history.push(goal);
    }

    fn would_exceed_budget(&self, goal: TaskId) -> bool {
        let Some(max) = self.config.max_plan_starts_per_goal else {
            return false;
        };
        let starts = if self.last_started_goal == Some(goal) {
            self.starts_for_goal
        } else {
            0
        };
        starts.saturating_add(1) > max
    }

    fn note_plan_start(&mut self, goal: TaskId) {
        if self.last_started_goal != Some(goal) {
            self.starts_for_goal = 0;
        }
        self.starts_for_goal = self.starts_for_goal.saturating_add(1);
        self.last_started_goal = Some(goal);
        self.plan_starts = self.plan_starts.saturating_add(1);
        self.last_plan_len = Some(self.plan.len());
    }

    fn goal_name(&self) -> &'static str {
        self.plan.goal().or(self.current_goal).map_or("", |g| g.0)
    }

    fn emit(&mut self, event: TraceEvent) {
        self.trace.emit(event);
    }
}

impl<A: Clone> Default for HtnDriver<A> {
    fn default() -> Self {
        Self::new()
    }
}
