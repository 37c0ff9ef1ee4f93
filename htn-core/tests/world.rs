use htn_core::{ConsumableKey, FactKey, StaticQuerier, Vec3, WorldQuerier, WorldState};

const ALERTNESS: FactKey = FactKey("alertness");
const PLAYER_IDENTIFIED: FactKey = FactKey("player_identified");
const LAST_KNOWN: ConsumableKey = ConsumableKey("last_known_location");

#[test]
fn missing_facts_read_as_none() {
    let ws = WorldState::new().with_value(ALERTNESS, 80.0);
    assert_eq!(ws.value(ALERTNESS), Some(80.0));
    assert_eq!(ws.flag(PLAYER_IDENTIFIED), None);
    assert_eq!(ws.vector(FactKey("player_position")), None);
}

#[test]
fn never_produced_fact_counts_as_consumed() {
    let mut ws = WorldState::new();
    assert!(!ws.facts.vector_available(LAST_KNOWN));
    assert_eq!(ws.consume_vector(LAST_KNOWN), None);
}

#[test]
fn consuming_twice_without_reproducing_fails() {
    let mut ws = WorldState::new();
    let spot = Vec3::new(4.0, 2.0, 0.0);
    ws.produce_vector(LAST_KNOWN, spot);
    assert!(ws.facts.vector_available(LAST_KNOWN));

    assert_eq!(ws.consume_vector(LAST_KNOWN), Some(spot));
    assert!(!ws.facts.vector_available(LAST_KNOWN));
    assert_eq!(ws.consume_vector(LAST_KNOWN), None);

    ws.produce_vector(LAST_KNOWN, spot);
    assert_eq!(ws.consume_vector(LAST_KNOWN), Some(spot));
}

#[test]
fn flag_and_value_facts_are_independent() {
    let mut ws = WorldState::new();
    let key = ConsumableKey("heard_noise");
    ws.produce_flag(key, true);
    assert!(ws.facts.flag_available(key));
    assert!(!ws.facts.value_available(key));
    assert_eq!(ws.consume_value(key), None);
    assert_eq!(ws.consume_flag(key), Some(true));

    ws.produce_value(key, 3.5);
    assert_eq!(ws.consume_value(key), Some(3.5));
}

#[test]
fn relative_rotation_reports_side_and_behind() {
    // forward +X, right +Y
    let q = StaticQuerier::new("guard").with_location(Vec3::new(0.0, 0.0, 5.0));

    let ahead_right = q.relative_rotation_to(10.0, 10.0);
    assert!(ahead_right.right_dot > 0.0);
    assert!(!ahead_right.behind);
    assert_eq!(ahead_right.direction.z, 0.0);

    let behind_left = q.relative_rotation_to(-10.0, -1.0);
    assert!(behind_left.right_dot < 0.0);
    assert!(behind_left.behind);
    assert!((behind_left.direction.length() - 1.0).abs() < 1e-5);
}
