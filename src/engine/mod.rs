//! Engine: tool discovery, input discovery and the PP -> REPLAY pipeline.
//!
//! The pipeline owns the per-file state machine and hands every external
//! execution to a [`crate::backend::Prover`]; it never spawns processes itself.

pub mod inputs;
pub mod pipeline;
pub mod toolchain;

pub use inputs::{GOAL_EXTENSION, discover_goals, ensure_unique_stems};
pub use pipeline::{
    MIN_REPLAY_OUTPUT_CHARS, Pipeline, PipelineConfig, PipelineState, read_result_label,
};
pub use toolchain::{KrtToolchain, ToolOverrides};
