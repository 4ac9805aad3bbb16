//! Plugin infrastructure for archmap pipeline stages.
//!
//! Stage implementations come from two places, both behind the same
//! capability traits:
//! - the **builtin registry** — statically linked stages looked up by name;
//! - **command plugins** — external executables declared by a TOML manifest
//!   and driven over a JSON stdin/stdout protocol.
//!
//! [`load_stage`] ties the two together: registry lookup first, then module
//! resolution and manifest loading, with distinct errors for "not found",
//! "won't load", and "doesn't implement the contract".

pub mod command;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod stage;

pub use loader::{CommandSpec, LoadedStage, MANIFEST_EXTENSIONS, StageSource, load_stage};
pub use registry::StageRegistry;
pub use resolver::resolve_module;
pub use stage::{
    Artifact, DocWriter, Extractor, Generator, PipelineContext, RenderedOutput, Renderer, Stage,
    ValidationReport, Validator,
};
