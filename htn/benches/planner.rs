use criterion::{black_box, criterion_group, criterion_main, Criterion};
use htn::{
    evaluate_plan, generate_plan, Condition, ConditionOp, PlannerConfig, PredicateRegistry, Task,
    TaskDatabase, TaskId,
};
use htn_core::{FactKey, StaticQuerier, WorldState};

#[derive(Debug, Clone)]
struct Spec;

const STAGE: FactKey = FactKey("stage");

fn leak(name: String) -> &'static str {
    Box::leak(name.into_boxed_str())
}

/// `step_i` needs stage `i - 1` and produces stage `i`; the goal needs the last stage.
fn chain(steps: usize) -> (TaskDatabase<Spec>, TaskId) {
    let mut db = TaskDatabase::new();
    for i in 0..steps {
        let name = leak(format!("step_{i}"));
        let mut task = Task::simple(name, Spec).with_postconditions(Condition::new().with_value(
            STAGE,
            ConditionOp::EqualTo,
            i as f32,
        ));
        if i > 0 {
            task = task.with_preconditions(Condition::new().with_value(
                STAGE,
                ConditionOp::EqualTo,
                (i - 1) as f32,
            ));
        }
        db.add_task(TaskId(name), task).expect("register step");
    }

    let goal = TaskId("goal");
    db.add_task(
        goal,
        Task::simple("goal", Spec).with_preconditions(Condition::new().with_value(
            STAGE,
            ConditionOp::EqualTo,
            (steps - 1) as f32,
        )),
    )
    .expect("register goal");
    (db, goal)
}

fn bench_generate_plan(c: &mut Criterion) {
    let (db, goal) = chain(64);
    let predicates = PredicateRegistry::new();
    let querier = StaticQuerier::new("bench");
    let config = PlannerConfig::default();

    c.bench_function("htn/generate_plan(chain=64)", |b| {
        b.iter(|| {
            let mut state = WorldState::new().with_value(STAGE, -1.0);
            let plan = generate_plan(goal, &mut state, &querier, &db, &predicates, &config);
            assert!(!plan.is_failed());
            black_box(plan.len());
        })
    });
}

fn bench_evaluate_compound(c: &mut Criterion) {
    let children = (0..256).map(|_| Task::simple("step", Spec)).collect();
    let mut db = TaskDatabase::new();
    db.add_task(TaskId("root"), Task::compound("root", children))
        .expect("register root");
    let predicates = PredicateRegistry::new();
    let querier = StaticQuerier::new("bench");
    let config = PlannerConfig::default();

    c.bench_function("htn/evaluate_plan(children=256)", |b| {
        b.iter(|| {
            let mut state = WorldState::new();
            let mut plan =
                generate_plan(TaskId("root"), &mut state, &querier, &db, &predicates, &config);
            while !plan.is_finished() && !plan.is_failed() {
                evaluate_plan(&mut plan, &mut state, &querier, &predicates);
            }
            black_box(plan.cursor());
        })
    });
}

criterion_group!(benches, bench_generate_plan, bench_evaluate_compound);
criterion_main!(benches);
