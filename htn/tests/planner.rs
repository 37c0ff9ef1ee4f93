use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use htn::{
    evaluate_plan, generate_plan, Condition, PlannerConfig, PredicateRegistry, Task,
    TaskDatabase, TaskId, TaskKind,
};
use htn_core::{FactKey, StaticQuerier, WorldState};

#[derive(Debug, Clone, PartialEq)]
enum Act {
    Noop,
    Open,
}

const X: FactKey = FactKey("x");
const P: FactKey = FactKey("p");
const DOOR_OPEN: FactKey = FactKey("door_open");

const A: TaskId = TaskId("a");
const B: TaskId = TaskId("b");

fn noop(name: &'static str) -> Task<Act> {
    Task::simple(name, Act::Noop)
}

fn querier() -> StaticQuerier {
    StaticQuerier::new("tester")
}

fn b_then_a() -> TaskDatabase<Act> {
    let mut db = TaskDatabase::new();
    db.add_task(
        A,
        noop("a").with_preconditions(Condition::new().with_flag(X, true)),
    )
    .unwrap();
    db.add_task(
        B,
        Task::simple("b", Act::Open).with_postconditions(Condition::new().with_flag(X, true)),
    )
    .unwrap();
    db
}

#[test]
fn chains_a_provider_in_front_of_the_goal() {
    let db = b_then_a();
    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new().with_flag(X, false);

    let plan = generate_plan(A, &mut state, &querier(), &db, &predicates, &PlannerConfig::default());

    assert!(!plan.is_failed());
    assert_eq!(plan.plan_path(), &[B, A]);
    let names: Vec<_> = plan.tasks().iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["b", "a"]);
    assert!(plan.tasks().iter().all(|t| t.parent.is_none()));
    assert!(plan.tasks()[0].started);
    assert!(!plan.tasks()[1].started);
    assert_eq!(plan.current_task().and_then(|t| t.action()), Some(&Act::Open));
    assert_eq!(plan.current_path_vertex(), Some(B));
    assert_eq!(plan.goal(), Some(A));
}

#[test]
fn goal_already_satisfied_is_a_single_task_plan() {
    let db = b_then_a();
    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new().with_flag(X, true);

    let plan = generate_plan(A, &mut state, &querier(), &db, &predicates, &PlannerConfig::default());
    assert!(!plan.is_failed());
    assert_eq!(plan.plan_path(), &[A]);
    assert_eq!(plan.len(), 1);
}

#[test]
fn plan_runs_to_completion_as_the_world_changes() {
    let db = b_then_a();
    let predicates = PredicateRegistry::new();
    let q = querier();
    let mut state = WorldState::new().with_flag(X, false);

    let mut plan = generate_plan(A, &mut state, &q, &db, &predicates, &PlannerConfig::default());

    evaluate_plan(&mut plan, &mut state, &q, &predicates);
    assert_eq!(plan.cursor(), 0, "b waits for its postcondition");
    assert!(!plan.is_failed());

    state.set_flag(X, true);
    evaluate_plan(&mut plan, &mut state, &q, &predicates);
    assert_eq!(plan.cursor(), 1);
    assert!(plan.tasks()[1].started);
    assert!(!plan.is_finished());

    evaluate_plan(&mut plan, &mut state, &q, &predicates);
    assert!(plan.is_finished());
    assert!(!plan.is_failed());
    assert_eq!(plan.progress(), 1.0);

    // Finished plans are left alone.
    evaluate_plan(&mut plan, &mut state, &q, &predicates);
    assert!(plan.is_finished());
}

#[test]
fn unreachable_goal_fails_with_an_empty_plan() {
    let mut db = TaskDatabase::new();
    db.add_task(
        A,
        noop("a").with_preconditions(Condition::new().with_flag(P, true)),
    )
    .unwrap();
    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new().with_flag(P, false);

    let plan = generate_plan(A, &mut state, &querier(), &db, &predicates, &PlannerConfig::default());
    assert!(plan.is_failed());
    assert!(plan.is_empty());

    let unknown = generate_plan(
        TaskId("missing"),
        &mut state,
        &querier(),
        &db,
        &predicates,
        &PlannerConfig::default(),
    );
    assert!(unknown.is_failed());
}

#[test]
fn expansion_budget_stops_the_search() {
    let db = b_then_a();
    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new().with_flag(X, false);

    let config = PlannerConfig { max_expansions: 1 };
    let plan = generate_plan(A, &mut state, &querier(), &db, &predicates, &config);
    assert!(plan.is_failed());
}

#[test]
fn dead_end_providers_are_pruned() {
    // `fake` provides X but needs P, which nothing provides.
    let mut db = TaskDatabase::new();
    db.add_task(
        A,
        noop("a").with_preconditions(Condition::new().with_flag(X, true)),
    )
    .unwrap();
    db.add_task(
        TaskId("fake"),
        noop("fake")
            .with_preconditions(Condition::new().with_flag(P, true))
            .with_postconditions(Condition::new().with_flag(X, true)),
    )
    .unwrap();
    db.add_task(
        B,
        noop("b").with_postconditions(Condition::new().with_flag(X, true)),
    )
    .unwrap();

    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new().with_flag(X, false).with_flag(P, false);
    let plan = generate_plan(A, &mut state, &querier(), &db, &predicates, &PlannerConfig::default());

    assert_eq!(plan.plan_path(), &[B, A]);
}

#[test]
fn abstract_goal_selects_the_viable_implementation() {
    let mut db = TaskDatabase::new();
    db.add_abstract(
        TaskId("enter"),
        Task::abstract_task("enter"),
        vec![
            (
                TaskId("pick_lock"),
                noop("pick_lock").with_preconditions(Condition::new().with_flag(P, true)),
            ),
            (
                TaskId("use_door"),
                Task::compound("use_door", vec![Task::simple("open", Act::Open), noop("walk")]),
            ),
        ],
    )
    .unwrap();

    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new().with_flag(P, false);
    let plan = generate_plan(
        TaskId("enter"),
        &mut state,
        &querier(),
        &db,
        &predicates,
        &PlannerConfig::default(),
    );

    assert!(!plan.is_failed());
    assert_eq!(plan.plan_path(), &[TaskId("use_door"), TaskId("enter")]);

    let names: Vec<_> = plan.tasks().iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["enter", "use_door", "open", "walk"]);
    let parents: Vec<_> = plan.tasks().iter().map(|t| t.parent).collect();
    assert_eq!(parents, vec![None, Some(0), Some(1), Some(1)]);
    assert!(plan.tasks()[1].last_child);
    assert!(!plan.tasks()[2].last_child);
    assert!(plan.tasks()[3].last_child);

    assert_eq!(plan.implementations_used(0), &[1]);
    assert!(matches!(plan.tasks()[0].kind, TaskKind::Abstract));
}

#[test]
fn abstract_in_the_middle_of_a_path_is_expanded() {
    let mut db = TaskDatabase::new();
    db.add_abstract(
        TaskId("open_door"),
        Task::abstract_task("open_door")
            .with_postconditions(Condition::new().with_flag(DOOR_OPEN, true)),
        vec![
            (
                TaskId("kick"),
                noop("kick").with_preconditions(Condition::new().with_flag(P, true)),
            ),
            (TaskId("push"), Task::simple("push", Act::Open)),
        ],
    )
    .unwrap();
    db.add_task(
        TaskId("leave"),
        noop("leave").with_preconditions(Condition::new().with_flag(DOOR_OPEN, true)),
    )
    .unwrap();

    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new()
        .with_flag(DOOR_OPEN, false)
        .with_flag(P, false);
    let plan = generate_plan(
        TaskId("leave"),
        &mut state,
        &querier(),
        &db,
        &predicates,
        &PlannerConfig::default(),
    );

    assert!(!plan.is_failed());
    assert_eq!(
        plan.plan_path(),
        &[TaskId("push"), TaskId("open_door"), TaskId("leave")]
    );
    let names: Vec<_> = plan.tasks().iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["open_door", "push", "leave"]);
    assert_eq!(plan.tasks()[1].parent, Some(0));
    assert_eq!(plan.tasks()[1].path_vertex, 0);
    assert_eq!(plan.tasks()[0].path_vertex, 1);
    assert_eq!(plan.tasks()[2].parent, None);
    assert_eq!(plan.implementations_used(0), &[1]);
}

#[test]
fn planning_starts_only_the_first_task() {
    let setups = Arc::new(AtomicUsize::new(0));
    let counter = setups.clone();

    let mut db = TaskDatabase::new();
    db.add_task(
        TaskId("greet"),
        Task::compound(
            "greet",
            vec![noop("wave").on_setup(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })],
        ),
    )
    .unwrap();

    let predicates = PredicateRegistry::new();
    let q = querier();
    let mut state = WorldState::new();
    let mut plan = generate_plan(TaskId("greet"), &mut state, &q, &db, &predicates, &PlannerConfig::default());
    assert!(plan.tasks()[0].started);
    assert_eq!(setups.load(Ordering::SeqCst), 0);

    // The compound node is passed through and the first simple task started in the same tick.
    evaluate_plan(&mut plan, &mut state, &q, &predicates);
    assert_eq!(plan.cursor(), 1);
    assert_eq!(setups.load(Ordering::SeqCst), 1);
    assert!(plan.describe().contains("> "));
}

#[test]
fn implementation_reachable_directly_is_routed_through_its_abstract() {
    // `sprint` provides X itself, so `a` is adjacent to both `sprint` and `hurry`.
    let mut db = TaskDatabase::new();
    db.add_abstract(
        TaskId("hurry"),
        Task::abstract_task("hurry").with_postconditions(Condition::new().with_flag(X, true)),
        vec![(
            TaskId("sprint"),
            noop("sprint").with_postconditions(Condition::new().with_flag(X, true)),
        )],
    )
    .unwrap();
    db.add_task(
        A,
        noop("a").with_preconditions(Condition::new().with_flag(X, true)),
    )
    .unwrap();
    assert_eq!(db.adjacent(A), &[TaskId("sprint"), TaskId("hurry")]);

    let predicates = PredicateRegistry::new();
    let mut state = WorldState::new().with_flag(X, false);
    let plan = generate_plan(A, &mut state, &querier(), &db, &predicates, &PlannerConfig::default());

    assert_eq!(plan.plan_path(), &[TaskId("sprint"), TaskId("hurry"), A]);
    let names: Vec<_> = plan.tasks().iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["hurry", "sprint", "a"]);
}
