//! Pipeline configuration: raw TOML schema and the resolved form.
//!
//! User config lives in `archmap.toml` next to the analyzed tree. Raw
//! config is a tree of stage nodes; [`resolve_config`] is a pure pass that
//! fills every node's include/exclude from the root `[defaults]` scope.
//! Include and exclude inherit independently: a node may inherit excludes
//! while defining its own includes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ArchmapError, Result};
use crate::pattern::GlobPattern;

/// Default configuration file name, looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "archmap.toml";

// ---------------------------------------------------------------------------
// Stage kinds
// ---------------------------------------------------------------------------

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Extract,
    Validate,
    Generate,
    Render,
    Docs,
}

impl StageKind {
    /// All stages in execution order.
    pub const ALL: [StageKind; 5] = [
        StageKind::Extract,
        StageKind::Validate,
        StageKind::Generate,
        StageKind::Render,
        StageKind::Docs,
    ];

    /// Config-facing name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Validate => "validate",
            Self::Generate => "generate",
            Self::Render => "render",
            Self::Docs => "docs",
        }
    }

    /// The capability symbol a plugin must provide for this stage; also the
    /// section name in a plugin manifest.
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Extract => "extractor",
            Self::Validate => "validator",
            Self::Generate => "generator",
            Self::Render => "renderer",
            Self::Docs => "doc-writer",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = ArchmapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "extract" => Ok(Self::Extract),
            "validate" => Ok(Self::Validate),
            "generate" => Ok(Self::Generate),
            "render" => Ok(Self::Render),
            "docs" => Ok(Self::Docs),
            other => Err(ArchmapError::config(format!("unknown stage kind `{other}`"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw config (matching the archmap.toml schema)
// ---------------------------------------------------------------------------

/// Top-level raw configuration, deserialized from TOML.
///
/// Unknown top-level keys (i.e. unknown stage kinds) are rejected at parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// `[project]` section.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Root-scope include/exclude defaults inherited by every node.
    #[serde(default)]
    pub defaults: ScopeDefaults,

    /// `[[extract]]` nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extract: Vec<RawStageNode>,

    /// `[[validate]]` nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validate: Vec<RawStageNode>,

    /// `[[generate]]` nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generate: Vec<RawStageNode>,

    /// `[[render]]` nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub render: Vec<RawStageNode>,

    /// `[[docs]]` nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<RawStageNode>,
}

impl RawConfig {
    fn nodes_of(&self, kind: StageKind) -> &[RawStageNode] {
        match kind {
            StageKind::Extract => &self.extract,
            StageKind::Validate => &self.validate,
            StageKind::Generate => &self.generate,
            StageKind::Render => &self.render,
            StageKind::Docs => &self.docs,
        }
    }
}

/// `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// System name used in the aggregated IR and generated artifacts.
    #[serde(default)]
    pub name: String,

    /// System description.
    #[serde(default)]
    pub description: String,

    /// Output directory for artifacts, rendered diagrams, and docs.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "archmap-out".into()
}

/// Root-scope `[defaults]` section. `None` means "nothing declared here" —
/// distinct from an explicit empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

/// One configured plugin node within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStageNode {
    /// Module specifier: a builtin name or a manifest path per the resolver.
    pub module: String,

    /// Include globs; inherited from `[defaults]` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    /// Exclude globs; inherited from `[defaults]` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    /// Stage-specific options passed through verbatim to the plugin.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// Fully resolved configuration: every node carries explicit patterns.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub project: ProjectConfig,
    /// All nodes across stages, in stage order then declaration order.
    pub nodes: Vec<ResolvedNode>,
}

impl ResolvedConfig {
    /// Nodes configured for one stage, in declaration order.
    pub fn nodes_for(&self, kind: StageKind) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }
}

/// A fully specified plugin node.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub kind: StageKind,
    pub module: String,
    pub include: Vec<GlobPattern>,
    pub exclude: Vec<GlobPattern>,
    pub options: serde_json::Value,
}

impl ResolvedNode {
    /// Exclude-first path filtering: a path matching any exclude is out; the
    /// remainder must match at least one include.
    pub fn matches_path(&self, rel_path: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(rel_path)) {
            return false;
        }
        self.include.iter().any(|p| p.matches(rel_path))
    }
}

/// Resolve raw configuration into explicit per-node patterns.
///
/// Pure function, no I/O. Single-pass and top-down: each node's resolved
/// value depends only on its own fields and the root scope, never on
/// siblings. A node with no include after inheritance gets the match-all
/// pattern.
pub fn resolve_config(raw: &RawConfig) -> Result<ResolvedConfig> {
    let mut nodes = Vec::new();

    for kind in StageKind::ALL {
        for (idx, node) in raw.nodes_of(kind).iter().enumerate() {
            if node.module.trim().is_empty() {
                return Err(ArchmapError::config(format!(
                    "{kind} node #{} has an empty module specifier",
                    idx + 1
                )));
            }

            let include_raw = node
                .include
                .as_ref()
                .or(raw.defaults.include.as_ref())
                .cloned()
                .unwrap_or_default();
            let exclude_raw = node
                .exclude
                .as_ref()
                .or(raw.defaults.exclude.as_ref())
                .cloned()
                .unwrap_or_default();

            let include = if include_raw.is_empty() {
                vec![GlobPattern::match_all()]
            } else {
                compile_patterns(kind, &node.module, &include_raw)?
            };
            let exclude = compile_patterns(kind, &node.module, &exclude_raw)?;

            nodes.push(ResolvedNode {
                kind,
                module: node.module.clone(),
                include,
                exclude,
                options: node.options.clone(),
            });
        }
    }

    Ok(ResolvedConfig {
        project: raw.project.clone(),
        nodes,
    })
}

fn compile_patterns(
    kind: StageKind,
    module: &str,
    patterns: &[String],
) -> Result<Vec<GlobPattern>> {
    patterns
        .iter()
        .map(|p| {
            GlobPattern::compile(p).map_err(|e| match e {
                ArchmapError::ConfigValidation { message } => {
                    ArchmapError::config(format!("{kind} node `{module}`: {message}"))
                }
                other => other,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load raw configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ArchmapError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ArchmapError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default config file into `dir`. Returns the path written.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    let config = RawConfig {
        project: ProjectConfig {
            name: "my-system".into(),
            ..Default::default()
        },
        extract: vec![RawStageNode {
            module: "fragments".into(),
            include: None,
            exclude: None,
            options: serde_json::Value::Null,
        }],
        validate: vec![RawStageNode {
            module: "basic".into(),
            include: None,
            exclude: None,
            options: serde_json::Value::Null,
        }],
        generate: vec![RawStageNode {
            module: "structurizr".into(),
            include: None,
            exclude: None,
            options: serde_json::Value::Null,
        }],
        docs: vec![RawStageNode {
            module: "markdown".into(),
            include: None,
            exclude: None,
            options: serde_json::Value::Null,
        }],
        ..Default::default()
    };

    let content =
        toml::to_string_pretty(&config).map_err(|e| ArchmapError::config(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| ArchmapError::io(&path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> RawConfig {
        toml::from_str(toml_str).expect("parse raw config")
    }

    #[test]
    fn include_and_exclude_inherit_independently() {
        let raw = parse(
            r#"
[defaults]
include = ["src/**"]
exclude = ["**/test/**"]

[[extract]]
module = "fragments"
include = ["lib/**"]
"#,
        );
        let resolved = resolve_config(&raw).expect("resolve");
        let node = resolved.nodes_for(StageKind::Extract).next().expect("node");

        assert_eq!(node.include.len(), 1);
        assert_eq!(node.include[0].as_str(), "lib/**");
        assert_eq!(node.exclude.len(), 1);
        assert_eq!(node.exclude[0].as_str(), "**/test/**");
    }

    #[test]
    fn missing_include_resolves_to_match_all() {
        let raw = parse("[[extract]]\nmodule = \"fragments\"\n");
        let resolved = resolve_config(&raw).expect("resolve");
        let node = resolved.nodes_for(StageKind::Extract).next().expect("node");

        assert_eq!(node.include[0].as_str(), "**");
        assert!(node.exclude.is_empty());
        assert!(node.matches_path("any/path/at/all.json"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let raw = parse(
            r#"
[defaults]
exclude = ["**/generated/**"]

[[extract]]
module = "fragments"
include = ["src/**"]
"#,
        );
        let resolved = resolve_config(&raw).expect("resolve");
        let node = resolved.nodes_for(StageKind::Extract).next().expect("node");

        assert!(node.matches_path("src/api/fragment.json"));
        assert!(!node.matches_path("src/generated/fragment.json"));
    }

    #[test]
    fn unknown_stage_kind_rejected_at_parse() {
        let result: std::result::Result<RawConfig, _> =
            toml::from_str("[[transmogrify]]\nmodule = \"x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn malformed_pattern_is_config_error() {
        let raw = parse("[[extract]]\nmodule = \"fragments\"\ninclude = [\"src/[oops\"]\n");
        let err = resolve_config(&raw).unwrap_err();
        assert!(matches!(err, ArchmapError::ConfigValidation { .. }));
        assert!(err.to_string().contains("fragments"));
    }

    #[test]
    fn sibling_order_does_not_affect_resolution() {
        let a = parse(
            r#"
[defaults]
exclude = ["**/skip/**"]

[[extract]]
module = "first"
include = ["a/**"]

[[extract]]
module = "second"
"#,
        );
        let b = parse(
            r#"
[defaults]
exclude = ["**/skip/**"]

[[extract]]
module = "second"

[[extract]]
module = "first"
include = ["a/**"]
"#,
        );

        let find = |cfg: &ResolvedConfig, module: &str| -> (Vec<String>, Vec<String>) {
            let node = cfg
                .nodes_for(StageKind::Extract)
                .find(|n| n.module == module)
                .expect("node");
            (
                node.include.iter().map(|p| p.as_str().to_string()).collect(),
                node.exclude.iter().map(|p| p.as_str().to_string()).collect(),
            )
        };

        let ra = resolve_config(&a).expect("resolve a");
        let rb = resolve_config(&b).expect("resolve b");
        assert_eq!(find(&ra, "first"), find(&rb, "first"));
        assert_eq!(find(&ra, "second"), find(&rb, "second"));
    }

    #[test]
    fn options_pass_through_verbatim() {
        let raw = parse(
            r#"
[[extract]]
module = "fragments"

[extract.options]
root = "fragments"
max_depth = 4
"#,
        );
        let resolved = resolve_config(&raw).expect("resolve");
        let node = resolved.nodes_for(StageKind::Extract).next().expect("node");
        assert_eq!(node.options["root"], "fragments");
        assert_eq!(node.options["max_depth"], 4);
    }

    #[test]
    fn default_config_roundtrips() {
        let dir = std::env::temp_dir().join(format!("archmap-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = init_config(&dir).expect("init");
        let raw = load_config(&path).expect("load");
        assert_eq!(raw.extract.len(), 1);
        assert_eq!(raw.extract[0].module, "fragments");
        assert_eq!(raw.project.output_dir, "archmap-out");
        std::fs::remove_dir_all(&dir).ok();
    }
}
