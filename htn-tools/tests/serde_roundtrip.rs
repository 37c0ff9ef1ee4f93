#![cfg(feature = "serde")]

use htn_tools::{TraceEvent, TraceLog};

#[test]
fn trace_log_json_roundtrip() {
    let log = TraceLog {
        events: vec![
            TraceEvent::new(1, "htn.plan.call").with_task("chase"),
            TraceEvent::new(1, "htn.plan.result").with_a(4).with_b(7),
            TraceEvent::new(3, "htn.plan.start").with_a(4).with_task("chase"),
        ],
    };

    let json = serde_json::to_string(&log).expect("serialize");
    let roundtrip: TraceLog = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(roundtrip, log);
}

#[test]
fn task_field_is_optional_in_json() {
    let json = r#"{"tick":2,"tag":"htn.plan.finished","a":1,"b":0}"#;
    let event: TraceEvent = serde_json::from_str(json).expect("deserialize");
    assert_eq!(event.task, None);
    assert_eq!(event.tag, "htn.plan.finished");
}
