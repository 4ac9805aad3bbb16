//! Command plugins: stage implementations backed by an external executable.
//!
//! One subprocess per invocation. The plugin receives a single JSON request
//! on stdin and must write a single JSON response to stdout; stderr is
//! inherited so plugin logs reach the user. A non-zero exit status or a
//! malformed response is a stage execution failure — there are no retries.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use archmap_shared::{ArchmapError, Ir, ResolvedNode, Result};

use crate::loader::CommandSpec;
use crate::stage::{
    Artifact, DocWriter, Extractor, Generator, PipelineContext, RenderedOutput, ValidationReport,
    Validator, Renderer,
};

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request written to the plugin's stdin.
#[derive(Debug, Serialize)]
struct PluginRequest<'a> {
    /// Which capability is being invoked ("extractor", "validator", ...).
    capability: &'static str,
    /// The node's pass-through options, verbatim.
    options: &'a Value,
    /// Run environment the plugin may need.
    context: RequestContext<'a>,
    /// The aggregated IR, for capabilities that consume it.
    #[serde(skip_serializing_if = "Option::is_none")]
    ir: Option<&'a Ir>,
    /// Generated artifacts, for renderers.
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts: Option<&'a [Artifact]>,
    /// Rendered outputs, for doc writers.
    #[serde(skip_serializing_if = "Option::is_none")]
    rendered: Option<&'a [RenderedOutput]>,
}

#[derive(Debug, Serialize)]
struct RequestContext<'a> {
    project_name: &'a str,
    project_description: &'a str,
    source_dir: &'a Path,
    output_dir: &'a Path,
    /// Include globs as written, so scanning plugins can honor them.
    include: Vec<&'a str>,
    exclude: Vec<&'a str>,
}

/// Validator response: violations fail the stage, warnings are collected.
#[derive(Debug, Deserialize)]
struct ValidatorResponse {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratorResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct RendererResponse {
    #[serde(default)]
    outputs: Vec<RenderedOutput>,
}

#[derive(Debug, Deserialize)]
struct DocWriterResponse {
    #[serde(default)]
    files: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Subprocess plumbing
// ---------------------------------------------------------------------------

/// Spawn the plugin, write the request, and parse the JSON response.
fn run_command(name: &str, spec: &CommandSpec, manifest_dir: &Path, request: &[u8]) -> Result<Value> {
    let working_dir = match &spec.working_dir {
        Some(dir) => {
            let dir = Path::new(dir);
            if dir.is_absolute() {
                dir.to_path_buf()
            } else {
                manifest_dir.join(dir)
            }
        }
        None => manifest_dir.to_path_buf(),
    };

    info!(plugin = name, command = %spec.command, "spawning plugin subprocess");

    let mut child = Command::new(&spec.command)
        .args(&spec.args)
        .current_dir(&working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit()) // Plugin logs go to parent stderr
        .spawn()
        .map_err(|e| {
            ArchmapError::plugin(format!(
                "failed to spawn `{}` for plugin {name}: {e}",
                spec.command
            ))
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ArchmapError::plugin(format!("failed to capture stdin of {name}")))?;
    stdin
        .write_all(request)
        .map_err(|e| ArchmapError::plugin(format!("failed to write request to {name}: {e}")))?;
    drop(stdin); // Close so the plugin sees EOF

    let output = child
        .wait_with_output()
        .map_err(|e| ArchmapError::plugin(format!("failed to wait for {name}: {e}")))?;

    if !output.status.success() {
        return Err(ArchmapError::plugin(format!(
            "plugin {name} exited with {}",
            output.status
        )));
    }

    debug!(plugin = name, response_len = output.stdout.len(), "plugin responded");

    serde_json::from_slice(&output.stdout)
        .map_err(|e| ArchmapError::plugin(format!("plugin {name} wrote invalid JSON: {e}")))
}

fn invoke(
    name: &str,
    spec: &CommandSpec,
    manifest_dir: &Path,
    capability: &'static str,
    node: &ResolvedNode,
    ctx: &PipelineContext,
    ir: Option<&Ir>,
    artifacts: Option<&[Artifact]>,
    rendered: Option<&[RenderedOutput]>,
) -> Result<Value> {
    let request = PluginRequest {
        capability,
        options: &node.options,
        context: RequestContext {
            project_name: &ctx.project_name,
            project_description: &ctx.project_description,
            source_dir: &ctx.source_dir,
            output_dir: &ctx.output_dir,
            include: node.include.iter().map(|p| p.as_str()).collect(),
            exclude: node.exclude.iter().map(|p| p.as_str()).collect(),
        },
        ir,
        artifacts,
        rendered,
    };

    let body = serde_json::to_vec(&request)
        .map_err(|e| ArchmapError::plugin(format!("failed to encode request: {e}")))?;
    run_command(name, spec, manifest_dir, &body)
}

fn decode<T: serde::de::DeserializeOwned>(name: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ArchmapError::plugin(format!("plugin {name} response shape: {e}")))
}

// ---------------------------------------------------------------------------
// Capability wrappers
// ---------------------------------------------------------------------------

macro_rules! command_stage {
    ($ty:ident) => {
        pub struct $ty {
            name: String,
            spec: CommandSpec,
            manifest_dir: PathBuf,
        }

        impl $ty {
            pub fn new(name: String, spec: CommandSpec, manifest_dir: PathBuf) -> Self {
                Self {
                    name,
                    spec,
                    manifest_dir,
                }
            }
        }
    };
}

command_stage!(CommandExtractor);
command_stage!(CommandValidator);
command_stage!(CommandGenerator);
command_stage!(CommandRenderer);
command_stage!(CommandDocWriter);

impl Extractor for CommandExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    /// The plugin's whole stdout is the IR fragment.
    fn extract(&self, node: &ResolvedNode, ctx: &PipelineContext) -> Result<Ir> {
        let value = invoke(
            &self.name,
            &self.spec,
            &self.manifest_dir,
            "extractor",
            node,
            ctx,
            None,
            None,
            None,
        )?;
        decode(&self.name, value)
    }
}

impl Validator for CommandValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(
        &self,
        ir: &Ir,
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<ValidationReport> {
        let value = invoke(
            &self.name,
            &self.spec,
            &self.manifest_dir,
            "validator",
            node,
            ctx,
            Some(ir),
            None,
            None,
        )?;
        let response: ValidatorResponse = decode(&self.name, value)?;

        if !response.errors.is_empty() {
            return Err(ArchmapError::ir_validation(response.errors.join("; ")));
        }
        Ok(ValidationReport {
            warnings: response.warnings,
        })
    }
}

impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        ir: &Ir,
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<Artifact>> {
        let value = invoke(
            &self.name,
            &self.spec,
            &self.manifest_dir,
            "generator",
            node,
            ctx,
            Some(ir),
            None,
            None,
        )?;
        let response: GeneratorResponse = decode(&self.name, value)?;
        Ok(response.artifacts)
    }
}

impl Renderer for CommandRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &self,
        artifacts: &[Artifact],
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<RenderedOutput>> {
        let value = invoke(
            &self.name,
            &self.spec,
            &self.manifest_dir,
            "renderer",
            node,
            ctx,
            None,
            Some(artifacts),
            None,
        )?;
        let response: RendererResponse = decode(&self.name, value)?;
        Ok(response.outputs)
    }
}

impl DocWriter for CommandDocWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_docs(
        &self,
        ir: &Ir,
        rendered: &[RenderedOutput],
        node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<PathBuf>> {
        let value = invoke(
            &self.name,
            &self.spec,
            &self.manifest_dir,
            "doc-writer",
            node,
            ctx,
            Some(ir),
            None,
            Some(rendered),
        )?;
        let response: DocWriterResponse = decode(&self.name, value)?;
        Ok(response.files)
    }
}
