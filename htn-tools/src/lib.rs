//! Tooling primitives for inspecting HTN planners.
//!
//! Engine-agnostic on purpose: debug overlays and inspectors consume the recorded events instead
//! of reaching into planner internals.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{NullTraceSink, TraceEvent, TraceLog, TraceRecorder, TraceSink, VecTraceSink};
