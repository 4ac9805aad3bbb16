//! Stage loading: builtin lookup, manifest resolution, contract checks.
//!
//! A module specifier is tried against the builtin registry first; anything
//! else must resolve (per [`crate::resolver`]) to a TOML plugin manifest
//! declaring one section per capability the plugin provides:
//!
//! ```toml
//! name = "python-ast"
//!
//! [extractor]
//! command = "python3"
//! args = ["scripts/ast-extractor.py"]
//! ```
//!
//! The three failure modes stay distinct: `ModuleNotFound` (specifier
//! resolves to nothing), `StageLoad` (file unreadable or invalid TOML), and
//! `StageContract` (loaded, but the section for the requested kind is
//! missing). No retries anywhere — a broken plugin is a configuration error
//! surfaced to the user.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use archmap_shared::{ArchmapError, Result, StageKind};

use crate::command::{
    CommandDocWriter, CommandExtractor, CommandGenerator, CommandRenderer, CommandValidator,
};
use crate::registry::StageRegistry;
use crate::resolver::resolve_module;
use crate::stage::Stage;

/// Candidate extensions probed when resolving a plugin manifest specifier.
pub const MANIFEST_EXTENSIONS: &[&str] = &[".toml"];

// ---------------------------------------------------------------------------
// Manifest schema
// ---------------------------------------------------------------------------

/// How to invoke one capability of a command plugin.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed before the request is written to stdin.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; relative paths resolve against the manifest's
    /// own directory.
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// A plugin manifest file. One section per capability the plugin exposes;
/// extra keys are tolerated so plugins can carry their own metadata.
#[derive(Debug, Clone, Deserialize)]
struct PluginManifest {
    /// Display name; defaults to the manifest file stem.
    name: Option<String>,
    extractor: Option<CommandSpec>,
    validator: Option<CommandSpec>,
    generator: Option<CommandSpec>,
    renderer: Option<CommandSpec>,
    #[serde(rename = "doc-writer")]
    doc_writer: Option<CommandSpec>,
}

impl PluginManifest {
    fn section(&self, kind: StageKind) -> Option<&CommandSpec> {
        match kind {
            StageKind::Extract => self.extractor.as_ref(),
            StageKind::Validate => self.validator.as_ref(),
            StageKind::Generate => self.generator.as_ref(),
            StageKind::Render => self.renderer.as_ref(),
            StageKind::Docs => self.doc_writer.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Where a loaded stage came from.
#[derive(Debug, Clone, PartialEq)]
pub enum StageSource {
    /// Statically linked builtin from the registry.
    Builtin,
    /// Command plugin declared by a manifest at this path.
    Manifest(PathBuf),
}

/// A stage implementation ready to run, plus its provenance.
#[derive(Debug)]
pub struct LoadedStage {
    pub stage: Stage,
    pub source: StageSource,
}

/// Load the stage implementation for `specifier` under `kind`.
pub fn load_stage(
    kind: StageKind,
    specifier: &str,
    base_dir: &Path,
    registry: &StageRegistry,
) -> Result<LoadedStage> {
    // Builtins shadow paths: a bare name registered for this kind wins.
    if let Some(stage) = registry.get(kind, specifier) {
        debug!(%kind, specifier, "loaded builtin stage");
        return Ok(LoadedStage {
            stage,
            source: StageSource::Builtin,
        });
    }
    if registry.contains_name(specifier) {
        // Known builtin, but not for this stage kind.
        return Err(ArchmapError::StageContract {
            specifier: specifier.to_string(),
            expected: kind.capability(),
        });
    }

    let path = resolve_module(specifier, base_dir, MANIFEST_EXTENSIONS)?;
    let manifest = read_manifest(&path)?;

    let Some(spec) = manifest.section(kind) else {
        return Err(ArchmapError::StageContract {
            specifier: specifier.to_string(),
            expected: kind.capability(),
        });
    };

    let name = manifest
        .name
        .clone()
        .or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| specifier.to_string());

    let manifest_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base_dir.to_path_buf());

    debug!(%kind, specifier, path = %path.display(), "loaded command plugin");

    let spec = spec.clone();
    let stage = match kind {
        StageKind::Extract => {
            Stage::Extractor(Box::new(CommandExtractor::new(name, spec, manifest_dir)))
        }
        StageKind::Validate => {
            Stage::Validator(Box::new(CommandValidator::new(name, spec, manifest_dir)))
        }
        StageKind::Generate => {
            Stage::Generator(Box::new(CommandGenerator::new(name, spec, manifest_dir)))
        }
        StageKind::Render => {
            Stage::Renderer(Box::new(CommandRenderer::new(name, spec, manifest_dir)))
        }
        StageKind::Docs => {
            Stage::DocWriter(Box::new(CommandDocWriter::new(name, spec, manifest_dir)))
        }
    };

    Ok(LoadedStage {
        stage,
        source: StageSource::Manifest(path),
    })
}

fn read_manifest(path: &Path) -> Result<PluginManifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ArchmapError::stage_load(path, e.to_string()))?;

    toml::from_str(&content)
        .map_err(|e| ArchmapError::stage_load(path, format!("invalid manifest: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use archmap_shared::{Ir, ResolvedNode};

    use crate::stage::{Extractor, PipelineContext, Stage};

    struct NullExtractor;

    impl Extractor for NullExtractor {
        fn name(&self) -> &str {
            "null"
        }
        fn extract(&self, _node: &ResolvedNode, _ctx: &PipelineContext) -> Result<Ir> {
            Ok(Ir::default())
        }
    }

    fn registry_with_null_extractor() -> StageRegistry {
        let mut registry = StageRegistry::new();
        registry.register(StageKind::Extract, "null", || {
            Stage::Extractor(Box::new(NullExtractor))
        });
        registry
    }

    #[test]
    fn builtin_name_loads_from_registry() {
        let registry = registry_with_null_extractor();
        let dir = TempDir::new().expect("tempdir");

        let loaded =
            load_stage(StageKind::Extract, "null", dir.path(), &registry).expect("load");
        assert_eq!(loaded.source, StageSource::Builtin);
        assert_eq!(loaded.stage.name(), "null");
    }

    #[test]
    fn builtin_under_wrong_kind_is_contract_error() {
        let registry = registry_with_null_extractor();
        let dir = TempDir::new().expect("tempdir");

        let err = load_stage(StageKind::Generate, "null", dir.path(), &registry).unwrap_err();
        match err {
            ArchmapError::StageContract { expected, .. } => assert_eq!(expected, "generator"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_module_is_not_found() {
        let registry = StageRegistry::new();
        let dir = TempDir::new().expect("tempdir");

        let err = load_stage(StageKind::Extract, "ghost", dir.path(), &registry).unwrap_err();
        assert!(matches!(err, ArchmapError::ModuleNotFound { .. }));
    }

    #[test]
    fn unreadable_manifest_is_load_error() {
        let registry = StageRegistry::new();
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("broken.toml"), "command = [not toml").expect("write");

        let err = load_stage(StageKind::Extract, "broken", dir.path(), &registry).unwrap_err();
        assert!(matches!(err, ArchmapError::StageLoad { .. }));
    }

    #[test]
    fn manifest_without_capability_section_is_contract_error() {
        let registry = StageRegistry::new();
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("gen-only.toml"),
            "[generator]\ncommand = \"gen\"\n",
        )
        .expect("write");

        let err = load_stage(StageKind::Extract, "gen-only", dir.path(), &registry).unwrap_err();
        match err {
            ArchmapError::StageContract { expected, .. } => assert_eq!(expected, "extractor"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn manifest_with_capability_loads_command_stage() {
        let registry = StageRegistry::new();
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("ast.toml"),
            "name = \"python-ast\"\n\n[extractor]\ncommand = \"python3\"\nargs = [\"parse.py\"]\n",
        )
        .expect("write");

        let loaded =
            load_stage(StageKind::Extract, "ast", dir.path(), &registry).expect("load");
        assert_eq!(loaded.stage.name(), "python-ast");
        assert_eq!(
            loaded.source,
            StageSource::Manifest(dir.path().join("ast.toml"))
        );
    }

    #[test]
    fn doc_writer_section_uses_kebab_case_key() {
        let registry = StageRegistry::new();
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("docs.toml"),
            "[doc-writer]\ncommand = \"./write-docs.sh\"\n",
        )
        .expect("write");

        let loaded = load_stage(StageKind::Docs, "docs", dir.path(), &registry).expect("load");
        assert!(matches!(loaded.stage, Stage::DocWriter(_)));
    }
}
