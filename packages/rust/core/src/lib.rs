//! Core pipeline orchestration for archmap.
//!
//! This crate ties configuration, plugin loading, extraction, aggregation,
//! and the downstream stages into one sequenced run.

pub mod pipeline;

pub use pipeline::{
    ProgressReporter, RunOptions, RunState, RunSummary, SilentProgress, run,
};
