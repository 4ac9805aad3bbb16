//! Builtin `markdown` doc writer.
//!
//! Writes `docs/architecture.md` under the output directory: entity and
//! relationship tables from the aggregated IR, plus links to any rendered
//! diagrams.

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::{info, instrument};

use archmap_plugins::{DocWriter, PipelineContext, RenderedOutput};
use archmap_shared::{ArchmapError, Ir, ResolvedNode, Result};

/// Builtin Markdown documentation writer.
pub struct MarkdownDocWriter;

impl DocWriter for MarkdownDocWriter {
    fn name(&self) -> &str {
        "markdown"
    }

    #[instrument(skip_all)]
    fn write_docs(
        &self,
        ir: &Ir,
        rendered: &[RenderedOutput],
        _node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<PathBuf>> {
        let mut md = String::new();

        let title = if ir.name.is_empty() {
            ctx.project_name.as_str()
        } else {
            ir.name.as_str()
        };
        writeln!(md, "# {title}\n").ok();

        if !ir.description.is_empty() {
            writeln!(md, "{}\n", ir.description).ok();
        }
        if let Some(ts) = ir.timestamp {
            writeln!(md, "_Model generated {}._\n", ts.format("%Y-%m-%d %H:%M UTC")).ok();
        }

        if !rendered.is_empty() {
            writeln!(md, "## Diagrams\n").ok();
            for output in rendered {
                writeln!(md, "![{}]({})\n", output.name, output.path.display()).ok();
            }
        }

        if !ir.actors.is_empty() {
            writeln!(md, "## Actors\n").ok();
            writeln!(md, "| Name | Kind | Description |").ok();
            writeln!(md, "|------|------|-------------|").ok();
            for actor in &ir.actors {
                writeln!(
                    md,
                    "| {} | {:?} | {} |",
                    cell(&actor.name),
                    actor.kind,
                    cell(&actor.description)
                )
                .ok();
            }
            md.push('\n');
        }

        if !ir.containers.is_empty() {
            writeln!(md, "## Containers\n").ok();
            writeln!(md, "| Name | Type | Layer | Technology | Description |").ok();
            writeln!(md, "|------|------|-------|------------|-------------|").ok();
            for container in &ir.containers {
                writeln!(
                    md,
                    "| {} | {} | {} | {} | {} |",
                    cell(&container.name),
                    cell(&container.container_type),
                    cell(&container.layer),
                    cell(container.technology.as_deref().unwrap_or("")),
                    cell(&container.description)
                )
                .ok();
            }
            md.push('\n');
        }

        if !ir.components.is_empty() {
            writeln!(md, "## Components\n").ok();
            writeln!(md, "| Name | Container | Description |").ok();
            writeln!(md, "|------|-----------|-------------|").ok();
            for component in &ir.components {
                writeln!(
                    md,
                    "| {} | {} | {} |",
                    cell(&component.name),
                    cell(&component.container_id),
                    cell(&component.description)
                )
                .ok();
            }
            md.push('\n');
        }

        if !ir.relationships.is_empty() {
            writeln!(md, "## Relationships\n").ok();
            writeln!(md, "| Source | Destination | Stereotype | Technology | Description |").ok();
            writeln!(md, "|--------|-------------|------------|------------|-------------|").ok();
            for rel in &ir.relationships {
                let technology =
                    rel.technology.iter().cloned().collect::<Vec<_>>().join(", ");
                writeln!(
                    md,
                    "| {} | {} | {} | {} | {} |",
                    cell(&rel.source_id),
                    cell(&rel.destination_id),
                    cell(&rel.stereotype),
                    cell(&technology),
                    cell(&rel.description)
                )
                .ok();
            }
            md.push('\n');
        }

        if !ir.deployments.is_empty() {
            writeln!(md, "## Deployments\n").ok();
            for deployment in &ir.deployments {
                writeln!(md, "### {}\n", deployment.name).ok();
                if !deployment.description.is_empty() {
                    writeln!(md, "{}\n", deployment.description).ok();
                }
                for instance in &deployment.instances {
                    if instance.node.is_empty() {
                        writeln!(md, "- `{}`", instance.container_id).ok();
                    } else {
                        writeln!(md, "- `{}` on {}", instance.container_id, instance.node).ok();
                    }
                }
                md.push('\n');
            }
        }

        let docs_dir = ctx.output_dir.join("docs");
        std::fs::create_dir_all(&docs_dir).map_err(|e| ArchmapError::io(&docs_dir, e))?;
        let path = docs_dir.join("architecture.md");
        std::fs::write(&path, md).map_err(|e| ArchmapError::io(&path, e))?;

        info!(path = %path.display(), "architecture docs written");
        Ok(vec![path])
    }
}

/// Keep table cells on one line and free of pipe collisions.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use archmap_shared::{Component, Container, GlobPattern, Relationship, StageKind};
    use chrono::Utc;
    use uuid::Uuid;

    fn ctx(out: &std::path::Path) -> PipelineContext {
        PipelineContext {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            project_name: "billing".into(),
            project_description: String::new(),
            base_dir: out.to_path_buf(),
            source_dir: out.to_path_buf(),
            output_dir: out.to_path_buf(),
        }
    }

    fn node() -> ResolvedNode {
        ResolvedNode {
            kind: StageKind::Docs,
            module: "markdown".into(),
            include: vec![GlobPattern::match_all()],
            exclude: vec![],
            options: serde_json::Value::Null,
        }
    }

    #[test]
    fn writes_architecture_markdown() {
        let dir = TempDir::new().expect("tempdir");
        let ir = Ir {
            name: "billing".into(),
            containers: vec![Container {
                id: "api".into(),
                name: "Api".into(),
                ..Default::default()
            }],
            components: vec![Component {
                id: "auth".into(),
                name: "Auth".into(),
                container_id: "api".into(),
                description: "token | session handling".into(),
                ..Default::default()
            }],
            relationships: vec![Relationship {
                source_id: "auth".into(),
                destination_id: "api".into(),
                stereotype: "uses".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let files = MarkdownDocWriter
            .write_docs(&ir, &[], &node(), &ctx(dir.path()))
            .expect("write docs");
        assert_eq!(files.len(), 1);

        let content = std::fs::read_to_string(&files[0]).expect("read back");
        assert!(content.starts_with("# billing"));
        assert!(content.contains("## Containers"));
        assert!(content.contains("| Auth | api |"));
        // Merged descriptions must not break the table row.
        assert!(content.contains("token \\| session handling"));
    }

    #[test]
    fn diagram_links_appear_when_renders_exist() {
        let dir = TempDir::new().expect("tempdir");
        let rendered = vec![RenderedOutput {
            name: "containers".into(),
            path: dir.path().join("containers.svg"),
        }];

        let files = MarkdownDocWriter
            .write_docs(&Ir::default(), &rendered, &node(), &ctx(dir.path()))
            .expect("write docs");
        let content = std::fs::read_to_string(&files[0]).expect("read back");
        assert!(content.contains("## Diagrams"));
        assert!(content.contains("containers.svg"));
    }
}
