//! Shared types, error model, and configuration for archmap.
//!
//! This crate is the foundation depended on by all other archmap crates.
//! It provides:
//! - [`ArchmapError`] — the unified error type
//! - The IR data model ([`Ir`] and its entity types)
//! - Configuration ([`RawConfig`], [`resolve_config`], config loading)
//! - Include/exclude glob patterns ([`GlobPattern`])

pub mod config;
pub mod error;
pub mod ir;
pub mod pattern;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, ProjectConfig, RawConfig, RawStageNode, ResolvedConfig, ResolvedNode,
    ScopeDefaults, StageKind, init_config, load_config, resolve_config,
};
pub use error::{ArchmapError, Result};
pub use ir::{
    Actor, ActorKind, CodeItem, Component, Container, Deployment, DeploymentInstance, Ir,
    Relationship, SourceLocation,
};
pub use pattern::GlobPattern;
