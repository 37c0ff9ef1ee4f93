//! Operator compatibility used when chaining tasks.
//!
//! `can_satisfy(post_op, a, pre_op, v)` answers: can a postcondition `x <post_op> a` leave the world
//! in a state where a precondition `x <pre_op> v` might hold?

use crate::ConditionOp;

pub fn can_satisfy(post_op: ConditionOp, a: f32, pre_op: ConditionOp, v: f32) -> bool {
    use ConditionOp::*;

    match post_op {
        LessThan => match pre_op {
            LessThan | LessEqual | NotEqualTo => true,
            EqualTo | GreaterThan | GreaterEqual => v < a,
        },
        LessEqual => match pre_op {
            LessThan | LessEqual | NotEqualTo => true,
            EqualTo | GreaterEqual => v <= a,
            GreaterThan => v < a,
        },
        EqualTo => match pre_op {
            LessThan => v > a,
            LessEqual => v >= a,
            EqualTo => v == a,
            NotEqualTo => v != a,
            GreaterThan => v < a,
            GreaterEqual => v <= a,
        },
        NotEqualTo => match pre_op {
            EqualTo => v != a,
            _ => true,
        },
        GreaterThan => match pre_op {
            LessThan | LessEqual | EqualTo => v > a,
            NotEqualTo | GreaterThan | GreaterEqual => true,
        },
        GreaterEqual => match pre_op {
            LessThan => v > a,
            LessEqual | EqualTo => v >= a,
            NotEqualTo | GreaterThan | GreaterEqual => true,
        },
    }
}
