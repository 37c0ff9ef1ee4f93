//! Headless tick loop: one agent, a scripted player, and a toy action backend.

use anyhow::{Context, Result};
use htn::{ActionBackend, HtnDriver, PredicateRegistry, Task, TaskDatabase, TaskId, TickInputs};
use htn_core::{FactKey, StaticQuerier, TickContext, Vec3, WorldQuerier, WorldState};
use htn_tools::{TraceLog, TraceSink};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::domain::{
    self, Action, DestinationKind, ALERTNESS, CURRENT_POSITION, DESTINATION, PLAYER_IDENTIFIED,
    PLAYER_LAST_KNOWN_LOCATION, PLAYER_POSITION,
};
use crate::selector::UtilitySelector;

/// Performs domain actions by moving the agent in a straight line and advancing timers.
#[derive(Debug, Default)]
pub struct ToyBackend {
    stacks: Vec<Vec3>,
    wander_points: Vec<Vec3>,
    next_stack: usize,
    next_wander: usize,
    performed: u64,
}

impl ToyBackend {
    pub fn new(stacks: Vec<Vec3>, wander_points: Vec<Vec3>) -> Self {
        Self {
            stacks,
            wander_points,
            ..Self::default()
        }
    }

    pub fn performed(&self) -> u64 {
        self.performed
    }

    fn next_destination(&mut self, kind: DestinationKind) -> Option<Vec3> {
        let (points, next) = match kind {
            DestinationKind::RandomStack => (&self.stacks, &mut self.next_stack),
            DestinationKind::RandomLocation => (&self.wander_points, &mut self.next_wander),
        };
        if points.is_empty() {
            return None;
        }
        let point = points[*next % points.len()];
        *next = next.wrapping_add(1);
        Some(point)
    }

    fn step_towards(state: &mut WorldState, target: FactKey, max_step: f32) {
        let Some(target) = state.vector(target) else {
            return;
        };
        let current = state.vector(CURRENT_POSITION).unwrap_or_default();
        state.set_vector(CURRENT_POSITION, current.step_towards(target, max_step));
    }
}

impl ActionBackend<Action> for ToyBackend {
    fn perform(
        &mut self,
        ctx: &TickContext,
        task: &mut Task<Action>,
        state: &mut WorldState,
        querier: &dyn WorldQuerier,
    ) {
        let Some(action) = task.action().copied() else {
            return;
        };
        self.performed += 1;

        match action {
            Action::Wait => {
                if let Some(timer) = task.parameters.vectors.first_mut() {
                    timer.x += ctx.dt_seconds;
                }
            }
            Action::SelectDestination(kind) => match self.next_destination(kind) {
                Some(destination) => {
                    debug!(agent = querier.name(), ?kind, ?destination, "selected destination");
                    state.set_vector(DESTINATION, destination);
                }
                None => {
                    warn!(agent = querier.name(), ?kind, "no destination to select");
                    task.failed = true;
                }
            },
            Action::MoveToDestination { speed } => {
                Self::step_towards(state, DESTINATION, speed * ctx.dt_seconds);
            }
            Action::MoveToPlayer { speed } => {
                if let Some(player) = state.vector(PLAYER_POSITION) {
                    let rotation = querier.relative_rotation_to(player.x, player.y);
                    debug!(
                        agent = querier.name(),
                        behind = rotation.behind,
                        right_dot = rotation.right_dot,
                        "moving to player"
                    );
                }
                Self::step_towards(state, PLAYER_POSITION, speed * ctx.dt_seconds);
            }
            Action::StopMoving => debug!(agent = querier.name(), "stopped"),
            Action::Bark(bark) => info!(agent = querier.name(), ?bark, "bark"),
            Action::BotherPlayer => info!(agent = querier.name(), "bothering the player"),
            Action::Idle => {}
        }
    }
}

/// Counters reported after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSummary {
    pub ticks: u64,
    pub plan_calls: u64,
    pub plan_starts: u64,
    pub plans_finished: usize,
    pub plans_failed: usize,
    pub repairs: usize,
    pub actions_performed: u64,
    pub goals: Vec<TaskId>,
}

pub struct Simulation {
    config: SimConfig,
    database: TaskDatabase<Action>,
    predicates: PredicateRegistry<Action>,
    state: WorldState,
    querier: StaticQuerier,
    driver: HtnDriver<Action>,
    selector: UtilitySelector,
    backend: ToyBackend,
    ctx: TickContext,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        let database = domain::build_database().context("Failed to build task database")?;
        let predicates = domain::predicates();
        database
            .validate(&predicates)
            .context("Task database references unregistered predicates")?;

        let fallback = domain::task_id(&database, &config.fallback_goal)
            .with_context(|| format!("Unknown fallback goal `{}`", config.fallback_goal))?;
        let state = initial_state(&config)?;
        let querier =
            StaticQuerier::new(config.agent.name.clone()).with_location(config.agent.position);
        let driver = HtnDriver::new()
            .with_config(config.driver)
            .with_fallback_goal(fallback)
            .with_trace_log();
        let backend = ToyBackend::new(config.stacks.clone(), config.wander_points.clone());
        let ctx = TickContext::new(0, config.dt_seconds);

        Ok(Self {
            config,
            database,
            predicates,
            state,
            querier,
            driver,
            selector: UtilitySelector::new(domain::goal_options()),
            backend,
            ctx,
        })
    }

    /// Stream trace events to `sink` as they happen, in addition to the in-memory log.
    pub fn with_trace_sink(mut self, sink: impl TraceSink + Send + 'static) -> Self {
        self.driver = self.driver.with_trace_sink(sink);
        self
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn driver(&self) -> &HtnDriver<Action> {
        &self.driver
    }

    pub fn database(&self) -> &TaskDatabase<Action> {
        &self.database
    }

    pub fn predicates(&self) -> &PredicateRegistry<Action> {
        &self.predicates
    }

    pub fn querier(&self) -> &StaticQuerier {
        &self.querier
    }

    pub fn selector(&self) -> &UtilitySelector {
        &self.selector
    }

    pub fn tick(&self) -> u64 {
        self.ctx.tick
    }

    pub fn take_trace(&mut self) -> Option<TraceLog> {
        self.driver.take_trace_log()
    }

    /// Advance the world by one tick.
    pub fn step(&mut self) {
        self.apply_script();
        self.querier.location = self.state.vector(CURRENT_POSITION).unwrap_or_default();

        self.driver.tick(
            &self.ctx,
            TickInputs {
                state: &mut self.state,
                querier: &self.querier,
                database: &self.database,
                predicates: &self.predicates,
            },
            &mut self.selector,
            &mut self.backend,
        );
        self.ctx = self.ctx.next();
    }

    pub fn run(&mut self, ticks: u64) -> SimSummary {
        let start = self.ctx.tick;
        for _ in 0..ticks {
            self.step();
        }
        info!(
            agent = self.querier.name(),
            ticks,
            plan_calls = self.driver.plan_calls(),
            "simulation finished"
        );
        self.summary(self.ctx.tick - start)
    }

    pub fn summary(&self, ticks: u64) -> SimSummary {
        let count = |tag: &str| self.driver.trace_log().map_or(0, |log| log.count(tag));
        SimSummary {
            ticks,
            plan_calls: self.driver.plan_calls(),
            plan_starts: self.driver.plan_starts(),
            plans_finished: count("htn.plan.finished"),
            plans_failed: count("htn.plan.failed"),
            repairs: count("htn.plan.repaired"),
            actions_performed: self.backend.performed(),
            goals: self.driver.history().iter().collect(),
        }
    }

    fn apply_script(&mut self) {
        if self.config.player.lose_sight_at_tick != Some(self.ctx.tick) {
            return;
        }
        self.state.set_flag(PLAYER_IDENTIFIED, false);
        if let Some(position) = self.state.vector(PLAYER_POSITION) {
            self.state.produce_vector(PLAYER_LAST_KNOWN_LOCATION, position);
        }
        info!(agent = self.querier.name(), tick = self.ctx.tick, "lost sight of the player");
    }
}

/// World state at tick 0: positions and sight from the config, then named facts on top.
pub fn initial_state(config: &SimConfig) -> Result<WorldState> {
    let mut state = WorldState::new()
        .with_vector(CURRENT_POSITION, config.agent.position)
        .with_vector(DESTINATION, config.agent.position)
        .with_vector(PLAYER_POSITION, config.player.position)
        .with_value(ALERTNESS, 0.0)
        .with_flag(PLAYER_IDENTIFIED, config.player.identified);

    for (name, flag) in &config.facts.flags {
        state.set_flag(domain::fact_key(name)?, *flag);
    }
    for (name, value) in &config.facts.values {
        state.set_value(domain::fact_key(name)?, *value);
    }
    for (name, vector) in &config.facts.vectors {
        state.set_vector(domain::fact_key(name)?, *vector);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BROWSE, CHASE};

    fn chase_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.player.position = Vec3::new(1000.0, 0.0, 0.0);
        config.player.identified = true;
        config.player.lose_sight_at_tick = Some(10);
        config.facts.values.insert("alertness".to_string(), 90.0);
        config
    }

    #[test]
    fn idle_agent_starts_browsing() {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        let summary = sim.run(40);

        assert_eq!(summary.goals.first(), Some(&BROWSE));
        assert_eq!(summary.plan_starts, 1);
        assert_eq!(summary.plans_failed, 0);
        assert!(summary.actions_performed > 0);
        // Moving towards the first stack.
        let position = sim.state().vector(CURRENT_POSITION).unwrap();
        assert!(position.x > 0.0);
    }

    #[test]
    fn losing_sight_mid_chase_repairs_the_plan() {
        let mut sim = Simulation::new(chase_config()).unwrap();
        let summary = sim.run(60);

        assert_eq!(summary.goals.first(), Some(&CHASE));
        assert_eq!(summary.plans_failed, 1);
        assert_eq!(summary.repairs, 1);
        assert!(summary.plans_finished >= 1);
        assert!(!sim
            .state()
            .facts
            .vector_available(PLAYER_LAST_KNOWN_LOCATION));

        let trace = sim.take_trace().unwrap();
        let repaired = trace.with_tag("htn.plan.repaired").next().unwrap();
        assert_eq!(repaired.task.as_deref(), Some("chase_last_known_position"));
        assert!(repaired.tick > 10);
    }

    #[test]
    fn unknown_fact_names_are_rejected() {
        let mut config = SimConfig::default();
        config.facts.flags.insert("mood".to_string(), true);
        let err = Simulation::new(config).err().unwrap();
        assert!(err.to_string().contains("mood"), "{err}");
    }

    #[test]
    fn unknown_fallback_goal_is_rejected() {
        let config = SimConfig {
            fallback_goal: "nap".to_string(),
            ..SimConfig::default()
        };
        assert!(Simulation::new(config).is_err());
    }
}
