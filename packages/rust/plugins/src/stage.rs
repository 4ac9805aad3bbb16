//! Stage capability traits and the shared pipeline context.
//!
//! Every stage implementation — builtin or external command plugin —
//! implements exactly one of the capability traits. The orchestrator owns
//! the IR accumulator and all intermediate outputs; stages receive what
//! they need by reference and cannot retain it beyond the call.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use archmap_shared::{Ir, ResolvedNode, Result, StageKind};

// ---------------------------------------------------------------------------
// Pipeline context
// ---------------------------------------------------------------------------

/// Run-scoped environment handed by reference to whichever stage is
/// currently executing. Rebuilt fresh each run; nothing persists across runs.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Time-sortable identifier for this run.
    pub run_id: Uuid,
    /// When the run started; also stamped into the aggregated IR.
    pub started_at: DateTime<Utc>,
    /// System name from `[project]`.
    pub project_name: String,
    /// System description from `[project]`.
    pub project_description: String,
    /// Base directory for module resolution (the tool's install location,
    /// passed explicitly — never the process CWD).
    pub base_dir: PathBuf,
    /// Root of the tree being analyzed; extractor scans resolve against it.
    pub source_dir: PathBuf,
    /// Where artifacts, rendered outputs, and docs land.
    pub output_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// A textual artifact produced by a generator (e.g. a Structurizr DSL
/// workspace). The orchestrator writes artifacts under the output directory
/// before the render stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// File name relative to the output directory.
    pub name: String,
    pub content: String,
}

/// A file produced by a renderer from generated artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedOutput {
    /// Display name (e.g. diagram key).
    pub name: String,
    /// Path of the rendered file on disk.
    pub path: PathBuf,
}

/// Non-fatal findings from a validator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Produces one IR fragment per invocation.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    fn extract(&self, node: &ResolvedNode, ctx: &PipelineContext) -> Result<Ir>;
}

/// Checks the aggregated IR; semantic violations are errors, suspicious but
/// tolerated shapes are warnings.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;
    fn validate(
        &self,
        ir: &Ir,
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<ValidationReport>;
}

/// Turns the aggregated IR into textual artifacts.
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(
        &self,
        ir: &Ir,
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<Artifact>>;
}

/// Produces diagram/image files from generated artifacts. Rendering is
/// delegated entirely to external tools via command plugins; the core ships
/// no builtin renderer.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;
    fn render(
        &self,
        artifacts: &[Artifact],
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<RenderedOutput>>;
}

/// Writes documentation files from the IR plus any rendered outputs.
pub trait DocWriter: Send + Sync {
    fn name(&self) -> &str;
    fn write_docs(
        &self,
        ir: &Ir,
        rendered: &[RenderedOutput],
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<PathBuf>>;
}

// ---------------------------------------------------------------------------
// Stage (kind-erased handle)
// ---------------------------------------------------------------------------

/// A loaded stage implementation, tagged by capability.
pub enum Stage {
    Extractor(Box<dyn Extractor>),
    Validator(Box<dyn Validator>),
    Generator(Box<dyn Generator>),
    Renderer(Box<dyn Renderer>),
    DocWriter(Box<dyn DocWriter>),
}

impl Stage {
    /// The stage kind this implementation serves.
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Extractor(_) => StageKind::Extract,
            Self::Validator(_) => StageKind::Validate,
            Self::Generator(_) => StageKind::Generate,
            Self::Renderer(_) => StageKind::Render,
            Self::DocWriter(_) => StageKind::Docs,
        }
    }

    /// Implementation name for tracing.
    pub fn name(&self) -> &str {
        match self {
            Self::Extractor(s) => s.name(),
            Self::Validator(s) => s.name(),
            Self::Generator(s) => s.name(),
            Self::Renderer(s) => s.name(),
            Self::DocWriter(s) => s.name(),
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
