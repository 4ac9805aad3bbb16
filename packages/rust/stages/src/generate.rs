//! Builtin `structurizr` generator.
//!
//! Emits a Structurizr DSL workspace (`workspace.dsl`) from the aggregated
//! IR: actors as `person`/`softwareSystem` elements, containers and
//! components nested under one software system, relationships between
//! element identifiers, and one `deploymentEnvironment` block per
//! deployment.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::{debug, instrument};

use archmap_plugins::{Artifact, Generator, PipelineContext};
use archmap_shared::{ActorKind, Ir, ResolvedNode, Result};

/// Builtin Structurizr DSL generator.
pub struct StructurizrGenerator;

impl Generator for StructurizrGenerator {
    fn name(&self) -> &str {
        "structurizr"
    }

    #[instrument(skip_all)]
    fn generate(
        &self,
        ir: &Ir,
        _node: &ResolvedNode,
        ctx: &PipelineContext,
    ) -> Result<Vec<Artifact>> {
        let mut ids = IdentifierTable::default();
        let mut dsl = String::new();

        let system_name = non_empty(&ir.name, &ctx.project_name, "System");
        let system_description = non_empty(&ir.description, &ctx.project_description, "");

        writeln!(
            dsl,
            "workspace {} {} {{",
            quote(system_name),
            quote(system_description)
        )
        .ok();
        writeln!(dsl, "    model {{").ok();

        for actor in &ir.actors {
            let ident = ids.assign(&actor.id, &actor.name);
            let element = match actor.kind {
                ActorKind::Person => "person",
                ActorKind::ExternalSystem => "softwareSystem",
            };
            writeln!(
                dsl,
                "        {ident} = {element} {} {}",
                quote(&actor.name),
                quote(&actor.description)
            )
            .ok();
        }

        let system_ident = ids.assign("", system_name);
        writeln!(
            dsl,
            "        {system_ident} = softwareSystem {} {} {{",
            quote(system_name),
            quote(system_description)
        )
        .ok();

        let mut emitted = vec![false; ir.components.len()];

        for container in &ir.containers {
            let ident = ids.assign(&container.id, &container.name);
            writeln!(
                dsl,
                "            {ident} = container {} {} {} {{",
                quote(&container.name),
                quote(&container.description),
                quote(container.technology.as_deref().unwrap_or(""))
            )
            .ok();

            for (i, component) in ir.components.iter().enumerate() {
                if !container.id.is_empty() && component.container_id == container.id {
                    emitted[i] = true;
                    let comp_ident = ids.assign(&component.id, &component.name);
                    writeln!(
                        dsl,
                        "                {comp_ident} = component {} {}",
                        quote(&component.name),
                        quote(&component.description)
                    )
                    .ok();
                }
            }

            writeln!(dsl, "            }}").ok();
        }

        // Components whose container is unknown still get an element so
        // their relationships keep both endpoints.
        for (i, component) in ir.components.iter().enumerate() {
            if !emitted[i] {
                let ident = ids.assign(&component.id, &component.name);
                writeln!(
                    dsl,
                    "            {ident} = component {} {}",
                    quote(&component.name),
                    quote(&component.description)
                )
                .ok();
            }
        }

        writeln!(dsl, "        }}").ok();

        let mut skipped_self = 0usize;
        let mut skipped_unknown = 0usize;
        for rel in &ir.relationships {
            // Structurizr rejects reflexive edges; dropping them is a
            // generator decision, the IR keeps them.
            if rel.source_id == rel.destination_id {
                skipped_self += 1;
                continue;
            }
            let (Some(source), Some(dest)) =
                (ids.lookup(&rel.source_id), ids.lookup(&rel.destination_id))
            else {
                skipped_unknown += 1;
                continue;
            };
            let label = if rel.description.is_empty() {
                &rel.stereotype
            } else {
                &rel.description
            };
            let technology = rel.technology.iter().cloned().collect::<Vec<_>>().join(", ");
            writeln!(
                dsl,
                "        {source} -> {dest} {} {}",
                quote(label),
                quote(&technology)
            )
            .ok();
        }

        for deployment in &ir.deployments {
            writeln!(
                dsl,
                "        deploymentEnvironment {} {{",
                quote(&deployment.name)
            )
            .ok();
            for instance in &deployment.instances {
                let node_name = non_empty(&instance.node, "", "default");
                writeln!(dsl, "            deploymentNode {} {{", quote(node_name)).ok();
                if let Some(ident) = ids.lookup(&instance.container_id) {
                    writeln!(dsl, "                containerInstance {ident}").ok();
                }
                writeln!(dsl, "            }}").ok();
            }
            writeln!(dsl, "        }}").ok();
        }

        writeln!(dsl, "    }}").ok();

        writeln!(dsl, "    views {{").ok();
        writeln!(dsl, "        systemContext {system_ident} {{").ok();
        writeln!(dsl, "            include *").ok();
        writeln!(dsl, "            autolayout lr").ok();
        writeln!(dsl, "        }}").ok();
        writeln!(dsl, "        container {system_ident} {{").ok();
        writeln!(dsl, "            include *").ok();
        writeln!(dsl, "            autolayout lr").ok();
        writeln!(dsl, "        }}").ok();
        writeln!(dsl, "    }}").ok();
        writeln!(dsl, "}}").ok();

        debug!(
            bytes = dsl.len(),
            skipped_self, skipped_unknown, "structurizr workspace generated"
        );

        Ok(vec![Artifact {
            name: "workspace.dsl".into(),
            content: dsl,
        }])
    }
}

fn non_empty<'a>(first: &'a str, second: &'a str, fallback: &'a str) -> &'a str {
    if !first.is_empty() {
        first
    } else if !second.is_empty() {
        second
    } else {
        fallback
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "'"))
}

/// Maps entity ids to unique DSL identifiers.
#[derive(Default)]
struct IdentifierTable {
    by_id: HashMap<String, String>,
    used: HashMap<String, usize>,
}

impl IdentifierTable {
    /// Derive a DSL-safe identifier from the id (or name when the id is
    /// empty) and remember the mapping.
    fn assign(&mut self, id: &str, name: &str) -> String {
        let basis = if id.is_empty() { name } else { id };
        let mut ident: String = basis
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        if ident.is_empty() || ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            ident.insert(0, 'e');
        }

        let count = self.used.entry(ident.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            ident = format!("{ident}_{count}");
        }

        if !id.is_empty() {
            self.by_id.insert(id.to_string(), ident.clone());
        }
        ident
    }

    fn lookup(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use archmap_shared::{
        Actor, Component, Container, GlobPattern, Relationship, StageKind,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn ctx() -> PipelineContext {
        let dir = Path::new(".");
        PipelineContext {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            project_name: "billing".into(),
            project_description: "billing platform".into(),
            base_dir: dir.to_path_buf(),
            source_dir: dir.to_path_buf(),
            output_dir: dir.to_path_buf(),
        }
    }

    fn node() -> ResolvedNode {
        ResolvedNode {
            kind: StageKind::Generate,
            module: "structurizr".into(),
            include: vec![GlobPattern::match_all()],
            exclude: vec![],
            options: serde_json::Value::Null,
        }
    }

    fn sample_ir() -> Ir {
        Ir {
            actors: vec![Actor {
                id: "user".into(),
                name: "Customer".into(),
                ..Default::default()
            }],
            containers: vec![Container {
                id: "api".into(),
                name: "Api".into(),
                technology: Some("rust".into()),
                ..Default::default()
            }],
            components: vec![Component {
                id: "auth".into(),
                name: "Auth".into(),
                container_id: "api".into(),
                ..Default::default()
            }],
            relationships: vec![Relationship {
                source_id: "user".into(),
                destination_id: "api".into(),
                stereotype: "uses".into(),
                technology: ["https".to_string()].into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn workspace_contains_model_elements_and_views() {
        let artifacts = StructurizrGenerator
            .generate(&sample_ir(), &node(), &ctx())
            .expect("generate");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "workspace.dsl");

        let dsl = &artifacts[0].content;
        assert!(dsl.contains("person \"Customer\""));
        assert!(dsl.contains("container \"Api\""));
        assert!(dsl.contains("component \"Auth\""));
        assert!(dsl.contains("user -> api"));
        assert!(dsl.contains("\"https\""));
        assert!(dsl.contains("systemContext"));
    }

    #[test]
    fn output_is_deterministic() {
        let a = StructurizrGenerator
            .generate(&sample_ir(), &node(), &ctx())
            .expect("generate");
        let b = StructurizrGenerator
            .generate(&sample_ir(), &node(), &ctx())
            .expect("generate");
        assert_eq!(a[0].content, b[0].content);
    }

    #[test]
    fn self_referential_relationships_are_dropped_here() {
        let mut ir = sample_ir();
        ir.relationships.push(Relationship {
            source_id: "api".into(),
            destination_id: "api".into(),
            stereotype: "uses".into(),
            ..Default::default()
        });

        let artifacts = StructurizrGenerator
            .generate(&ir, &node(), &ctx())
            .expect("generate");
        assert!(!artifacts[0].content.contains("api -> api"));
    }

    #[test]
    fn quotes_inside_names_are_neutralized() {
        let mut ir = sample_ir();
        ir.containers[0].description = "the \"edge\" tier".into();

        let artifacts = StructurizrGenerator
            .generate(&ir, &node(), &ctx())
            .expect("generate");
        assert!(artifacts[0].content.contains("the 'edge' tier"));
    }
}
