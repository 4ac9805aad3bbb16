//! Builtin stage implementations and the default registry.
//!
//! Builtins cover the common path without any external plugin: fragment
//! ingestion, IR validation, Structurizr DSL generation, and Markdown docs.
//! There is deliberately no builtin renderer — rendering is delegated to
//! external tools through command plugins.

mod docs;
mod extract;
mod generate;
mod validate;

use archmap_plugins::{Stage, StageRegistry};
use archmap_shared::StageKind;

pub use docs::MarkdownDocWriter;
pub use extract::FragmentExtractor;
pub use generate::StructurizrGenerator;
pub use validate::BasicValidator;

/// The registry with all builtin stages registered.
pub fn builtin_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry.register(StageKind::Extract, "fragments", || {
        Stage::Extractor(Box::new(FragmentExtractor))
    });
    registry.register(StageKind::Validate, "basic", || {
        Stage::Validator(Box::new(BasicValidator))
    });
    registry.register(StageKind::Generate, "structurizr", || {
        Stage::Generator(Box::new(StructurizrGenerator))
    });
    registry.register(StageKind::Docs, "markdown", || {
        Stage::DocWriter(Box::new(MarkdownDocWriter))
    });
    registry
}
