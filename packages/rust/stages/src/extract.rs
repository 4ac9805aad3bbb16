//! Builtin `fragments` extractor.
//!
//! Collects pre-extracted IR fragment files (`*.json`) from the source tree
//! and returns their union as one fragment. The files are typically emitted
//! by language-specific tooling outside this pipeline; this extractor does
//! no source parsing of its own.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use archmap_plugins::{Extractor, PipelineContext};
use archmap_shared::{ArchmapError, Ir, ResolvedNode, Result};

/// Options accepted under `[extract.options]`.
#[derive(Debug, Default, Deserialize)]
struct FragmentOptions {
    /// Scan root, relative to the source directory.
    #[serde(default)]
    root: Option<String>,
}

/// Builtin extractor ingesting IR fragment JSON files.
pub struct FragmentExtractor;

impl Extractor for FragmentExtractor {
    fn name(&self) -> &str {
        "fragments"
    }

    #[instrument(skip_all, fields(node = %node.module))]
    fn extract(&self, node: &ResolvedNode, ctx: &PipelineContext) -> Result<Ir> {
        let options: FragmentOptions = parse_options(&node.options)?;
        let scan_root = match &options.root {
            Some(root) => ctx.source_dir.join(root),
            None => ctx.source_dir.clone(),
        };

        if !scan_root.is_dir() {
            return Err(ArchmapError::config(format!(
                "fragment scan root {} is not a directory",
                scan_root.display()
            )));
        }

        let mut files = Vec::new();
        collect_files(&scan_root, &scan_root, &mut files)?;
        // Scan order must not leak into the fragment.
        files.sort();

        let mut combined = Ir::default();
        let mut ingested = 0usize;

        for rel in &files {
            if !rel.ends_with(".json") || !node.matches_path(rel) {
                continue;
            }
            let path = scan_root.join(rel);
            let content =
                std::fs::read_to_string(&path).map_err(|e| ArchmapError::io(&path, e))?;

            match serde_json::from_str::<Ir>(&content) {
                Ok(fragment) => {
                    ingested += 1;
                    absorb(&mut combined, fragment);
                }
                Err(e) => {
                    // Leave malformed files to the author; the rest of the
                    // tree still aggregates.
                    warn!(path = %path.display(), error = %e, "skipping unparseable fragment file");
                }
            }
        }

        debug!(
            scanned = files.len(),
            ingested,
            entities = combined.entity_count(),
            "fragment scan complete"
        );

        Ok(combined)
    }
}

fn parse_options(options: &serde_json::Value) -> Result<FragmentOptions> {
    if options.is_null() {
        return Ok(FragmentOptions::default());
    }
    serde_json::from_value(options.clone())
        .map_err(|e| ArchmapError::config(format!("fragments extractor options: {e}")))
}

/// Recursively gather files as `/`-separated paths relative to `base`.
fn collect_files(dir: &Path, base: &Path, out: &mut Vec<String>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArchmapError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| ArchmapError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, base, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(rel);
        }
    }
    Ok(())
}

/// Concatenate a fragment into the combined output. No dedup here — the
/// aggregator owns identity resolution.
fn absorb(combined: &mut Ir, fragment: Ir) {
    if combined.name.is_empty() {
        combined.name = fragment.name;
    }
    if combined.description.is_empty() {
        combined.description = fragment.description;
    }
    combined.actors.extend(fragment.actors);
    combined.containers.extend(fragment.containers);
    combined.components.extend(fragment.components);
    combined.code.extend(fragment.code);
    combined.relationships.extend(fragment.relationships);
    combined.deployments.extend(fragment.deployments);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use archmap_shared::{GlobPattern, StageKind};
    use chrono::Utc;
    use uuid::Uuid;

    fn ctx(dir: &Path) -> PipelineContext {
        PipelineContext {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            project_name: "demo".into(),
            project_description: String::new(),
            base_dir: dir.to_path_buf(),
            source_dir: dir.to_path_buf(),
            output_dir: dir.join("out"),
        }
    }

    fn node(include: &[&str], exclude: &[&str]) -> ResolvedNode {
        ResolvedNode {
            kind: StageKind::Extract,
            module: "fragments".into(),
            include: include
                .iter()
                .map(|p| GlobPattern::compile(p).expect("compile"))
                .collect(),
            exclude: exclude
                .iter()
                .map(|p| GlobPattern::compile(p).expect("compile"))
                .collect(),
            options: serde_json::Value::Null,
        }
    }

    fn write_fragment(dir: &Path, rel: &str, json: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, json).expect("write");
    }

    #[test]
    fn collects_matching_fragment_files() {
        let dir = TempDir::new().expect("tempdir");
        write_fragment(
            dir.path(),
            "src/api.json",
            r#"{"components": [{"id": "c1", "name": "Api"}]}"#,
        );
        write_fragment(
            dir.path(),
            "src/db.json",
            r#"{"containers": [{"id": "db", "name": "Database"}]}"#,
        );

        let ir = FragmentExtractor
            .extract(&node(&["**"], &[]), &ctx(dir.path()))
            .expect("extract");
        assert_eq!(ir.components.len(), 1);
        assert_eq!(ir.containers.len(), 1);
    }

    #[test]
    fn honors_include_and_exclude_patterns() {
        let dir = TempDir::new().expect("tempdir");
        write_fragment(
            dir.path(),
            "src/api.json",
            r#"{"components": [{"id": "c1", "name": "Api"}]}"#,
        );
        write_fragment(
            dir.path(),
            "src/test/fixture.json",
            r#"{"components": [{"id": "tx", "name": "Fixture"}]}"#,
        );
        write_fragment(
            dir.path(),
            "vendor/dep.json",
            r#"{"components": [{"id": "v1", "name": "Vendored"}]}"#,
        );

        let ir = FragmentExtractor
            .extract(&node(&["src/**"], &["**/test/**"]), &ctx(dir.path()))
            .expect("extract");
        assert_eq!(ir.components.len(), 1);
        assert_eq!(ir.components[0].id, "c1");
    }

    #[test]
    fn skips_unparseable_files() {
        let dir = TempDir::new().expect("tempdir");
        write_fragment(dir.path(), "bad.json", "{ not json");
        write_fragment(
            dir.path(),
            "good.json",
            r#"{"actors": [{"id": "u", "name": "User"}]}"#,
        );

        let ir = FragmentExtractor
            .extract(&node(&["**"], &[]), &ctx(dir.path()))
            .expect("extract");
        assert_eq!(ir.actors.len(), 1);
    }

    #[test]
    fn duplicate_entities_pass_through_unmerged() {
        // Identity resolution happens at aggregation, not extraction.
        let dir = TempDir::new().expect("tempdir");
        write_fragment(
            dir.path(),
            "a.json",
            r#"{"components": [{"id": "c1", "name": "Api"}]}"#,
        );
        write_fragment(
            dir.path(),
            "b.json",
            r#"{"components": [{"id": "c1", "name": "Api"}]}"#,
        );

        let ir = FragmentExtractor
            .extract(&node(&["**"], &[]), &ctx(dir.path()))
            .expect("extract");
        assert_eq!(ir.components.len(), 2);
    }

    #[test]
    fn scan_root_option_narrows_the_walk() {
        let dir = TempDir::new().expect("tempdir");
        write_fragment(
            dir.path(),
            "fragments/one.json",
            r#"{"actors": [{"id": "u", "name": "User"}]}"#,
        );
        write_fragment(
            dir.path(),
            "elsewhere/two.json",
            r#"{"actors": [{"id": "x", "name": "Other"}]}"#,
        );

        let mut n = node(&["**"], &[]);
        n.options = serde_json::json!({"root": "fragments"});

        let ir = FragmentExtractor
            .extract(&n, &ctx(dir.path()))
            .expect("extract");
        assert_eq!(ir.actors.len(), 1);
        assert_eq!(ir.actors[0].id, "u");
    }
}
