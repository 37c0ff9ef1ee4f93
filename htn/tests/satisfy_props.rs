use htn::{can_satisfy, ConditionOp};
use proptest::prelude::*;

fn any_op() -> impl Strategy<Value = ConditionOp> {
    prop_oneof![
        Just(ConditionOp::LessThan),
        Just(ConditionOp::LessEqual),
        Just(ConditionOp::EqualTo),
        Just(ConditionOp::NotEqualTo),
        Just(ConditionOp::GreaterThan),
        Just(ConditionOp::GreaterEqual),
    ]
}

proptest! {
    #[test]
    fn same_operator_and_value_can_satisfy_itself(op in any_op(), a in -1.0e6f32..1.0e6) {
        prop_assert!(can_satisfy(op, a, op, a));
    }

    #[test]
    fn exact_postcondition_behaves_like_the_precondition(
        op in any_op(),
        a in -1000i32..1000,
        v in -1000i32..1000,
    ) {
        let (a, v) = (a as f32, v as f32);
        prop_assert_eq!(can_satisfy(ConditionOp::EqualTo, a, op, v), op.compare(a, v));
    }

    #[test]
    fn not_equal_never_blocks_ordering(op in any_op(), a in -1.0e3f32..1.0e3, v in -1.0e3f32..1.0e3) {
        prop_assume!(op != ConditionOp::EqualTo);
        prop_assert!(can_satisfy(ConditionOp::NotEqualTo, a, op, v));
    }
}
