//! Pipeline orchestration: extract → validate → generate → render → docs.
//!
//! The orchestrator owns the run: it loads each configured node, threads
//! the shared context through the stages strictly in sequence, and owns the
//! single mutable IR accumulator. A stage failure is fatal — the run moves
//! to `Failed`, remaining stages are skipped, and the error surfaces with
//! the stage and node attached. Nothing is retried and no partial output is
//! trusted.
//!
//! Fragments are aggregated in configured-node order, so any internal
//! concurrency an extractor uses cannot leak into the merged result.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use archmap_aggregate::aggregate;
use archmap_plugins::{
    Artifact, LoadedStage, PipelineContext, RenderedOutput, Stage, StageRegistry, load_stage,
};
use archmap_shared::{ArchmapError, Ir, ResolvedConfig, ResolvedNode, Result, StageKind};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Pipeline lifecycle states, in order; `Failed` is terminal and reachable
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Validating,
    Generating,
    Rendering,
    Documenting,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Validating => "validating",
            Self::Generating => "generating",
            Self::Rendering => "rendering",
            Self::Documenting => "documenting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Options / progress / summary
// ---------------------------------------------------------------------------

/// Per-run inputs that don't come from the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Base directory for module resolution (the tool's install location).
    pub base_dir: PathBuf,
    /// Root of the tree being analyzed.
    pub source_dir: PathBuf,
    /// Output directory; overrides `[project] output_dir` when set.
    pub output_dir: Option<PathBuf>,
    /// Stop after this stage completes (e.g. `Validate` to obtain the
    /// aggregated IR without producing artifacts).
    pub halt_after: Option<StageKind>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new state.
    fn state(&self, state: RunState);
    /// Called after a node completes within a stage.
    fn node_done(&self, kind: StageKind, module: &str);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn state(&self, _state: RunState) {}
    fn node_done(&self, _kind: StageKind, _module: &str) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    /// The aggregated (and validated) IR.
    pub ir: Ir,
    /// Number of fragments that fed the aggregation.
    pub fragments: usize,
    /// Validation warnings collected across validator nodes.
    pub warnings: Vec<String>,
    /// Artifacts written under the output directory.
    pub artifacts: Vec<Artifact>,
    /// Files produced by renderers.
    pub rendered: Vec<RenderedOutput>,
    /// Documentation files written.
    pub doc_files: Vec<PathBuf>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Run the configured pipeline to completion.
#[instrument(skip_all, fields(project = %config.project.name))]
pub fn run(
    config: &ResolvedConfig,
    registry: &StageRegistry,
    opts: &RunOptions,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    match run_inner(config, registry, opts, progress) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            error!(state = %RunState::Failed, error = %e, "pipeline run failed");
            Err(e)
        }
    }
}

fn run_inner(
    config: &ResolvedConfig,
    registry: &StageRegistry,
    opts: &RunOptions,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    let output_dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.project.output_dir));

    let ctx = PipelineContext {
        run_id: Uuid::now_v7(),
        started_at: Utc::now(),
        project_name: config.project.name.clone(),
        project_description: config.project.description.clone(),
        base_dir: opts.base_dir.clone(),
        source_dir: opts.source_dir.clone(),
        output_dir,
    };

    info!(run_id = %ctx.run_id, source = %ctx.source_dir.display(), "starting pipeline run");
    enter(RunState::Idle, progress);

    // --- Extract ---
    enter(RunState::Extracting, progress);
    let mut fragments: Vec<Ir> = Vec::new();
    for node in config.nodes_for(StageKind::Extract) {
        let loaded = load_node(registry, node, &ctx)?;
        let Stage::Extractor(extractor) = loaded.stage else {
            unreachable!("loader returned non-extractor for extract kind");
        };
        let fragment = extractor
            .extract(node, &ctx)
            .map_err(|e| e.in_stage(StageKind::Extract.as_str(), Some(&node.module)))?;
        info!(
            node = %node.module,
            entities = fragment.entity_count(),
            relationships = fragment.relationships.len(),
            "fragment extracted"
        );
        fragments.push(fragment);
        progress.node_done(StageKind::Extract, &node.module);
    }

    let fragment_count = fragments.len();
    let mut ir = aggregate(fragments);
    if !config.project.name.is_empty() {
        ir.name = config.project.name.clone();
    }
    if !config.project.description.is_empty() {
        ir.description = config.project.description.clone();
    }
    ir.timestamp = Some(ctx.started_at);

    let mut summary = RunSummary {
        run_id: ctx.run_id,
        state: RunState::Extracting,
        ir,
        fragments: fragment_count,
        warnings: Vec::new(),
        artifacts: Vec::new(),
        rendered: Vec::new(),
        doc_files: Vec::new(),
        elapsed: Duration::ZERO,
    };

    if halted(opts, StageKind::Extract) {
        return finish(summary, start, progress);
    }

    // --- Validate ---
    enter(RunState::Validating, progress);
    for node in config.nodes_for(StageKind::Validate) {
        let loaded = load_node(registry, node, &ctx)?;
        let Stage::Validator(validator) = loaded.stage else {
            unreachable!("loader returned non-validator for validate kind");
        };
        let report = validator
            .validate(&summary.ir, node, &ctx)
            .map_err(|e| e.in_stage(StageKind::Validate.as_str(), Some(&node.module)))?;
        summary.warnings.extend(report.warnings);
        progress.node_done(StageKind::Validate, &node.module);
    }

    if halted(opts, StageKind::Validate) {
        return finish(summary, start, progress);
    }

    // --- Generate ---
    enter(RunState::Generating, progress);
    for node in config.nodes_for(StageKind::Generate) {
        let loaded = load_node(registry, node, &ctx)?;
        let Stage::Generator(generator) = loaded.stage else {
            unreachable!("loader returned non-generator for generate kind");
        };
        let artifacts = generator
            .generate(&summary.ir, node, &ctx)
            .map_err(|e| e.in_stage(StageKind::Generate.as_str(), Some(&node.module)))?;
        summary.artifacts.extend(artifacts);
        progress.node_done(StageKind::Generate, &node.module);
    }
    write_artifacts(&ctx, &summary.artifacts)
        .map_err(|e| e.in_stage(StageKind::Generate.as_str(), None))?;

    if halted(opts, StageKind::Generate) {
        return finish(summary, start, progress);
    }

    // --- Render ---
    enter(RunState::Rendering, progress);
    for node in config.nodes_for(StageKind::Render) {
        let loaded = load_node(registry, node, &ctx)?;
        let Stage::Renderer(renderer) = loaded.stage else {
            unreachable!("loader returned non-renderer for render kind");
        };
        let outputs = renderer
            .render(&summary.artifacts, node, &ctx)
            .map_err(|e| e.in_stage(StageKind::Render.as_str(), Some(&node.module)))?;
        summary.rendered.extend(outputs);
        progress.node_done(StageKind::Render, &node.module);
    }

    if halted(opts, StageKind::Render) {
        return finish(summary, start, progress);
    }

    // --- Docs ---
    enter(RunState::Documenting, progress);
    for node in config.nodes_for(StageKind::Docs) {
        let loaded = load_node(registry, node, &ctx)?;
        let Stage::DocWriter(writer) = loaded.stage else {
            unreachable!("loader returned non-doc-writer for docs kind");
        };
        let files = writer
            .write_docs(&summary.ir, &summary.rendered, node, &ctx)
            .map_err(|e| e.in_stage(StageKind::Docs.as_str(), Some(&node.module)))?;
        summary.doc_files.extend(files);
        progress.node_done(StageKind::Docs, &node.module);
    }

    finish(summary, start, progress)
}

fn enter(state: RunState, progress: &dyn ProgressReporter) {
    info!(state = %state, "pipeline state");
    progress.state(state);
}

fn halted(opts: &RunOptions, after: StageKind) -> bool {
    opts.halt_after == Some(after)
}

fn finish(
    mut summary: RunSummary,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    summary.state = RunState::Done;
    summary.elapsed = start.elapsed();
    enter(RunState::Done, progress);
    progress.done(&summary);

    info!(
        run_id = %summary.run_id,
        fragments = summary.fragments,
        entities = summary.ir.entity_count(),
        warnings = summary.warnings.len(),
        elapsed_ms = summary.elapsed.as_millis(),
        "pipeline run complete"
    );
    Ok(summary)
}

/// Loader failures are configuration errors; they surface unwrapped so the
/// user sees not-found / load / contract distinctions directly.
fn load_node(
    registry: &StageRegistry,
    node: &ResolvedNode,
    ctx: &PipelineContext,
) -> Result<LoadedStage> {
    load_stage(node.kind, &node.module, &ctx.base_dir, registry)
}

/// Write generated artifacts under the output directory so renderers and
/// doc writers can reference them on disk.
fn write_artifacts(ctx: &PipelineContext, artifacts: &[Artifact]) -> Result<()> {
    if artifacts.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(&ctx.output_dir)
        .map_err(|e| ArchmapError::io(&ctx.output_dir, e))?;
    for artifact in artifacts {
        let path = ctx.output_dir.join(&artifact.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArchmapError::io(parent, e))?;
        }
        std::fs::write(&path, &artifact.content).map_err(|e| ArchmapError::io(&path, e))?;
        info!(path = %path.display(), "artifact written");
    }
    Ok(())
}
