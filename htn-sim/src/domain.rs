//! Reference domain: a shop NPC that browses, wanders, chases and bothers the player.

use htn::{
    Condition, ConditionOp, GoalHistory, HtnError, PredicateId, PredicateRegistry, Task,
    TaskDatabase, TaskId, TaskParameters,
};
use htn_core::{ConsumableKey, FactKey, Vec3, WorldState};

pub const CURRENT_POSITION: FactKey = FactKey("current_position");
pub const PLAYER_POSITION: FactKey = FactKey("player_position");
pub const DESTINATION: FactKey = FactKey("destination");
pub const ALERTNESS: FactKey = FactKey("alertness");
pub const PLAYER_IDENTIFIED: FactKey = FactKey("player_identified");

pub const PLAYER_LAST_KNOWN_LOCATION: ConsumableKey = ConsumableKey("player_last_known_location");

const FACT_KEYS: [FactKey; 5] = [
    CURRENT_POSITION,
    PLAYER_POSITION,
    DESTINATION,
    ALERTNESS,
    PLAYER_IDENTIFIED,
];

pub const NEAR_PLAYER: PredicateId = PredicateId("near_player");
pub const NEAR_DESTINATION: PredicateId = PredicateId("near_destination");
pub const TIME_ELAPSED: PredicateId = PredicateId("time_elapsed");
pub const PARAMETER_FLAG: PredicateId = PredicateId("parameter_flag");

pub const BROWSE: TaskId = TaskId("browse");
pub const WANDER: TaskId = TaskId("wander");
pub const CHASE: TaskId = TaskId("chase");
pub const CHASE_SIGHT: TaskId = TaskId("chase_sight");
pub const CHASE_LAST_KNOWN_POSITION: TaskId = TaskId("chase_last_known_position");
pub const BOTHER: TaskId = TaskId("bother");
pub const IDLE: TaskId = TaskId("idle");

/// Squared distance under which the agent counts as next to the player.
const NEAR_PLAYER_DISTANCE_SQ: f32 = 100_000.0;
/// Default squared acceptance radius for destinations.
const NEAR_DESTINATION_DISTANCE_SQ: f32 = 50_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    RandomStack,
    RandomLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bark {
    RegainedSightOfPlayer,
    LostSightOfPlayer,
    Bother,
}

/// What the backend does for a simple task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Wait,
    SelectDestination(DestinationKind),
    MoveToDestination { speed: f32 },
    MoveToPlayer { speed: f32 },
    StopMoving,
    Bark(Bark),
    BotherPlayer,
    Idle,
}

/// Resolve a fact name from configuration.
pub fn fact_key(name: &str) -> Result<FactKey, HtnError> {
    FACT_KEYS
        .iter()
        .copied()
        .find(|key| key.0 == name)
        .ok_or_else(|| HtnError::UnknownFact(name.to_string()))
}

fn distance_squared(state: &WorldState, a: FactKey, b: FactKey) -> Option<f32> {
    Some(state.vector(a)?.distance_squared(state.vector(b)?))
}

pub fn predicates() -> PredicateRegistry<Action> {
    PredicateRegistry::new()
        .with(NEAR_PLAYER, |state, _task, _index| {
            distance_squared(state, CURRENT_POSITION, PLAYER_POSITION)
                .is_some_and(|d| d < NEAR_PLAYER_DISTANCE_SQ)
        })
        .with(NEAR_DESTINATION, |state, task, index| {
            let minimum = index
                .and_then(|i| task.parameters.vectors.get(i))
                .map_or(NEAR_DESTINATION_DISTANCE_SQ, |v| v.x);
            distance_squared(state, CURRENT_POSITION, DESTINATION).is_some_and(|d| d < minimum)
        })
        .with(TIME_ELAPSED, |_state, task, index| {
            index
                .and_then(|i| task.parameters.vectors.get(i))
                .is_some_and(|timer| timer.x >= timer.y)
        })
        .with(PARAMETER_FLAG, |_state, task, index| {
            index
                .and_then(|i| task.parameters.vectors.get(i))
                .is_some_and(|v| v.x != 0.0)
        })
}

/// Waits `seconds`; the backend advances `parameters.vectors[0].x`.
fn wait(seconds: f32) -> Task<Action> {
    Task::simple("wait", Action::Wait)
        .with_parameters(TaskParameters {
            vectors: vec![Vec3::new(0.0, seconds, 0.0)],
            ..TaskParameters::default()
        })
        .with_postconditions(Condition::new().with_predicate_at(TIME_ELAPSED, 0))
        .on_setup(move |task, _state, _querier| {
            if let Some(timer) = task.parameters.vectors.first_mut() {
                *timer = Vec3::new(0.0, seconds, 0.0);
            }
        })
}

fn select_destination(kind: DestinationKind) -> Task<Action> {
    Task::simple("select_destination", Action::SelectDestination(kind))
}

fn move_to_destination(speed: f32) -> Task<Action> {
    Task::simple("move_to_destination", Action::MoveToDestination { speed })
        .with_postconditions(Condition::new().with_predicate(NEAR_DESTINATION))
}

fn stop_moving() -> Task<Action> {
    Task::simple("stop_moving", Action::StopMoving)
}

fn bark(bark: Bark) -> Task<Action> {
    Task::simple("bark", Action::Bark(bark))
}

fn browse() -> Task<Action> {
    Task::compound(
        "browse",
        vec![
            select_destination(DestinationKind::RandomStack),
            move_to_destination(70.0),
            wait(5.0),
        ],
    )
}

fn wander() -> Task<Action> {
    Task::compound(
        "wander",
        vec![
            select_destination(DestinationKind::RandomLocation),
            move_to_destination(70.0),
            stop_moving(),
            wait(5.0),
        ],
    )
}

fn move_to_player() -> Task<Action> {
    Task::simple("move_to_player", Action::MoveToPlayer { speed: 200.0 })
        .with_preconditions(
            Condition::new()
                .with_value(ALERTNESS, ConditionOp::GreaterEqual, 80.0)
                .with_flag(PLAYER_IDENTIFIED, true),
        )
        .with_postconditions(Condition::new().with_predicate(NEAR_PLAYER))
}

fn chase_sight() -> Task<Action> {
    Task::compound(
        "chase_sight",
        vec![
            bark(Bark::RegainedSightOfPlayer),
            move_to_player(),
            stop_moving(),
        ],
    )
    .with_preconditions(
        Condition::new()
            .with_flag(PLAYER_IDENTIFIED, true)
            .with_value(ALERTNESS, ConditionOp::GreaterThan, 60.0),
    )
    .with_postconditions(Condition::new().with_predicate(NEAR_PLAYER))
}

fn chase_last_known_position() -> Task<Action> {
    let move_to_last_known = move_to_destination(320.0)
        .with_preconditions(Condition::new().with_consumable_vector(PLAYER_LAST_KNOWN_LOCATION))
        .on_setup(|_task, state, _querier| {
            if let Some(fact) = state.facts.vectors.get(&PLAYER_LAST_KNOWN_LOCATION) {
                let location = fact.value;
                state.set_vector(DESTINATION, location);
            }
        })
        .on_finish(|state, _task| {
            state.consume_vector(PLAYER_LAST_KNOWN_LOCATION);
        });

    Task::compound(
        "chase_last_known_position",
        vec![bark(Bark::LostSightOfPlayer), move_to_last_known],
    )
    .with_preconditions(
        Condition::new()
            .with_consumable_vector(PLAYER_LAST_KNOWN_LOCATION)
            .with_flag(PLAYER_IDENTIFIED, false),
    )
}

fn bother() -> Task<Action> {
    Task::compound(
        "bother",
        vec![bark(Bark::Bother), Task::simple("bother_player", Action::BotherPlayer), wait(3.0)],
    )
    .with_preconditions(Condition::new().with_predicate(NEAR_PLAYER))
}

/// Register every task of the domain.
pub fn build_database() -> Result<TaskDatabase<Action>, HtnError> {
    let mut db = TaskDatabase::new();
    db.add_task(BROWSE, browse())?;
    db.add_task(WANDER, wander())?;
    db.add_abstract(
        CHASE,
        Task::abstract_task("chase")
            .with_postconditions(Condition::new().with_predicate(NEAR_PLAYER)),
        vec![
            (CHASE_SIGHT, chase_sight()),
            (CHASE_LAST_KNOWN_POSITION, chase_last_known_position()),
        ],
    )?;
    db.add_task(BOTHER, bother())?;
    db.add_task(IDLE, Task::simple("idle", Action::Idle))?;
    Ok(db)
}

/// Look up a registered task by its id string.
pub fn task_id(database: &TaskDatabase<Action>, name: &str) -> Option<TaskId> {
    database.ids().find(|id| id.0 == name)
}

/// Goals the agent considers each time it needs a new plan.
pub fn goal_options() -> Vec<crate::selector::GoalOption> {
    use crate::selector::GoalOption;

    fn novelty(history: &GoalHistory, goal: TaskId) -> f32 {
        history.distance_since(goal).min(4) as f32 / 4.0
    }

    vec![
        GoalOption::new(BOTHER, |state, _history| {
            let near = distance_squared(state, CURRENT_POSITION, PLAYER_POSITION)
                .is_some_and(|d| d < NEAR_PLAYER_DISTANCE_SQ);
            if near && state.flag(PLAYER_IDENTIFIED) == Some(true) {
                3.0
            } else {
                0.0
            }
        }),
        GoalOption::new(CHASE, |state, _history| {
            let lead = state.flag(PLAYER_IDENTIFIED) == Some(true)
                || state.facts.vector_available(PLAYER_LAST_KNOWN_LOCATION);
            if !lead {
                return 0.0;
            }
            2.0 * state.value(ALERTNESS).unwrap_or(0.0) / 100.0
        }),
        GoalOption::new(BROWSE, |_state, history| novelty(history, BROWSE)),
        GoalOption::new(WANDER, |_state, history| 0.8 * novelty(history, WANDER)),
        GoalOption::new(IDLE, |_state, _history| 0.1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use htn::{generate_plan, PlannerConfig};
    use htn_core::StaticQuerier;

    fn names(plan: &htn::Plan<Action>) -> Vec<&'static str> {
        plan.tasks().iter().map(|t| t.name).collect()
    }

    fn hunting_state() -> WorldState {
        WorldState::new()
            .with_vector(CURRENT_POSITION, Vec3::ZERO)
            .with_vector(PLAYER_POSITION, Vec3::new(1000.0, 0.0, 0.0))
            .with_value(ALERTNESS, 90.0)
            .with_flag(PLAYER_IDENTIFIED, true)
    }

    #[test]
    fn domain_predicates_are_all_registered() {
        let db = build_database().unwrap();
        db.validate(&predicates()).unwrap();
        assert_eq!(db.implementations(CHASE).map(<[TaskId]>::len), Some(2));
    }

    #[test]
    fn bother_chains_through_chase_when_far_from_the_player() {
        let db = build_database().unwrap();
        let mut state = hunting_state();
        let plan = generate_plan(
            BOTHER,
            &mut state,
            &StaticQuerier::new("barker"),
            &db,
            &predicates(),
            &PlannerConfig::default(),
        );

        assert!(!plan.is_failed());
        assert_eq!(plan.plan_path(), &[CHASE_SIGHT, CHASE, BOTHER]);
        assert_eq!(
            names(&plan),
            vec![
                "chase",
                "chase_sight",
                "bark",
                "move_to_player",
                "stop_moving",
                "bother",
                "bark",
                "bother_player",
                "wait",
            ]
        );
    }

    #[test]
    fn lost_player_is_chased_to_the_last_known_location() {
        let db = build_database().unwrap();
        let mut state = hunting_state().with_flag(PLAYER_IDENTIFIED, false);
        state.produce_vector(PLAYER_LAST_KNOWN_LOCATION, Vec3::new(500.0, 0.0, 0.0));

        let plan = generate_plan(
            CHASE,
            &mut state,
            &StaticQuerier::new("barker"),
            &db,
            &predicates(),
            &PlannerConfig::default(),
        );
        assert_eq!(plan.plan_path(), &[CHASE_LAST_KNOWN_POSITION, CHASE]);
        assert_eq!(plan.implementations_used(0), &[1]);
    }

    #[test]
    fn wait_completes_once_its_timer_runs_out() {
        let registry = predicates();
        let mut task = wait(2.0);
        let state = WorldState::new();
        assert!(!task.postconditions.is_true(&state, &task, &registry));
        task.parameters.vectors[0].x = 2.0;
        assert!(task.postconditions.is_true(&state, &task, &registry));
    }

    #[test]
    fn near_destination_uses_the_parameter_radius_when_given() {
        let registry = predicates();
        let state = WorldState::new()
            .with_vector(CURRENT_POSITION, Vec3::ZERO)
            .with_vector(DESTINATION, Vec3::new(100.0, 0.0, 0.0));
        let tight = Task::simple("probe", Action::Idle).with_parameters(TaskParameters {
            vectors: vec![Vec3::new(25.0, 0.0, 0.0)],
            ..TaskParameters::default()
        });

        assert!(registry.evaluate(NEAR_DESTINATION, &state, &tight, None));
        assert!(!registry.evaluate(NEAR_DESTINATION, &state, &tight, Some(0)));
        assert!(!registry.evaluate(PARAMETER_FLAG, &state, &tight, Some(1)));
        assert!(registry.evaluate(PARAMETER_FLAG, &state, &tight, Some(0)));
    }

    #[test]
    fn task_ids_resolve_by_name() {
        let db = build_database().unwrap();
        assert_eq!(task_id(&db, "bother"), Some(BOTHER));
        assert_eq!(task_id(&db, "chase_sight"), Some(CHASE_SIGHT));
        assert_eq!(task_id(&db, "nap"), None);
    }

    #[test]
    fn fact_names_resolve() {
        assert_eq!(fact_key("alertness").unwrap(), ALERTNESS);
        assert!(matches!(fact_key("mood"), Err(HtnError::UnknownFact(name)) if name == "mood"));
    }
}
