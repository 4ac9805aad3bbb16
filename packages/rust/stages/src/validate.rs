//! Builtin `basic` validator.
//!
//! Semantic checks the aggregator deliberately leaves alone: referential
//! integrity of relationship endpoints and entity-id uniqueness are errors;
//! unresolved containment references and repeated deployment placements are
//! warnings.

use std::collections::{HashMap, HashSet};

use tracing::{instrument, warn};

use archmap_plugins::{PipelineContext, ValidationReport, Validator};
use archmap_shared::{ArchmapError, Ir, ResolvedNode, Result};

/// Builtin IR validator.
pub struct BasicValidator;

impl Validator for BasicValidator {
    fn name(&self) -> &str {
        "basic"
    }

    #[instrument(skip_all)]
    fn validate(
        &self,
        ir: &Ir,
        _node: &ResolvedNode,
        _ctx: &PipelineContext,
    ) -> Result<ValidationReport> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        check_unique_ids(ir, &mut errors);

        let known_ids: HashSet<&str> = ir.entity_ids().collect();

        // Dangling relationship endpoints are hard errors: downstream
        // generators would emit edges into nothing.
        for rel in &ir.relationships {
            for (side, id) in [("source", &rel.source_id), ("destination", &rel.destination_id)] {
                if !id.is_empty() && !known_ids.contains(id.as_str()) {
                    errors.push(format!(
                        "relationship {} -[{}]-> {} references unknown {side} `{id}`",
                        rel.source_id, rel.stereotype, rel.destination_id
                    ));
                }
            }
        }

        // Containment references degrade output but don't invalidate it.
        for component in &ir.components {
            if !component.container_id.is_empty()
                && !known_ids.contains(component.container_id.as_str())
            {
                warnings.push(format!(
                    "component `{}` references unknown container `{}`",
                    component.id, component.container_id
                ));
            }
        }
        for item in &ir.code {
            if !item.component_id.is_empty() && !known_ids.contains(item.component_id.as_str()) {
                warnings.push(format!(
                    "code element `{}` references unknown component `{}`",
                    item.id, item.component_id
                ));
            }
        }

        check_deployment_duplicates(ir, &mut warnings);

        for warning in &warnings {
            warn!(%warning, "IR validation warning");
        }

        if !errors.is_empty() {
            return Err(ArchmapError::ir_validation(errors.join("; ")));
        }

        Ok(ValidationReport { warnings })
    }
}

fn check_unique_ids(ir: &Ir, errors: &mut Vec<String>) {
    let collections: [(&str, Vec<&str>); 4] = [
        ("actor", ir.actors.iter().map(|a| a.id.as_str()).collect()),
        (
            "container",
            ir.containers.iter().map(|c| c.id.as_str()).collect(),
        ),
        (
            "component",
            ir.components.iter().map(|c| c.id.as_str()).collect(),
        ),
        ("code", ir.code.iter().map(|c| c.id.as_str()).collect()),
    ];

    for (collection, ids) in collections {
        let mut seen = HashSet::new();
        for id in ids.into_iter().filter(|id| !id.is_empty()) {
            if !seen.insert(id) {
                errors.push(format!("duplicate {collection} id `{id}`"));
            }
        }
    }
}

/// Deployments are concatenated across fragments by design; repeated
/// (environment, container) placements usually mean two extractors claim
/// the same environment. Surfaced as warnings, never deduplicated.
fn check_deployment_duplicates(ir: &Ir, warnings: &mut Vec<String>) {
    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    for deployment in &ir.deployments {
        for instance in &deployment.instances {
            *seen
                .entry((deployment.name.as_str(), instance.container_id.as_str()))
                .or_default() += 1;
        }
    }
    for ((environment, container), count) in seen {
        if count > 1 {
            warnings.push(format!(
                "container `{container}` placed {count} times in deployment `{environment}`"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use archmap_shared::{
        Component, Deployment, DeploymentInstance, GlobPattern, Relationship, StageKind,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn ctx() -> PipelineContext {
        let dir = Path::new(".");
        PipelineContext {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            project_name: "demo".into(),
            project_description: String::new(),
            base_dir: dir.to_path_buf(),
            source_dir: dir.to_path_buf(),
            output_dir: dir.to_path_buf(),
        }
    }

    fn node() -> ResolvedNode {
        ResolvedNode {
            kind: StageKind::Validate,
            module: "basic".into(),
            include: vec![GlobPattern::match_all()],
            exclude: vec![],
            options: serde_json::Value::Null,
        }
    }

    fn component(id: &str) -> Component {
        Component {
            id: id.into(),
            name: id.to_uppercase(),
            ..Default::default()
        }
    }

    #[test]
    fn clean_ir_passes_with_no_warnings() {
        let ir = Ir {
            components: vec![component("a"), component("b")],
            relationships: vec![Relationship {
                source_id: "a".into(),
                destination_id: "b".into(),
                stereotype: "uses".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let report = BasicValidator.validate(&ir, &node(), &ctx()).expect("valid");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn dangling_relationship_endpoint_is_an_error() {
        let ir = Ir {
            components: vec![component("a")],
            relationships: vec![Relationship {
                source_id: "a".into(),
                destination_id: "ghost".into(),
                stereotype: "uses".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let err = BasicValidator.validate(&ir, &node(), &ctx()).unwrap_err();
        assert!(matches!(err, ArchmapError::IrValidation { .. }));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn duplicate_entity_id_is_an_error() {
        let ir = Ir {
            components: vec![component("dup"), component("dup")],
            ..Default::default()
        };

        let err = BasicValidator.validate(&ir, &node(), &ctx()).unwrap_err();
        assert!(err.to_string().contains("duplicate component id"));
    }

    #[test]
    fn duplicate_deployment_placement_is_a_warning_not_an_error() {
        let instance = DeploymentInstance {
            container_id: "api".into(),
            node: String::new(),
        };
        let ir = Ir {
            containers: vec![archmap_shared::Container {
                id: "api".into(),
                name: "Api".into(),
                ..Default::default()
            }],
            deployments: vec![
                Deployment {
                    name: "prod".into(),
                    instances: vec![instance.clone()],
                    ..Default::default()
                },
                Deployment {
                    name: "prod".into(),
                    instances: vec![instance],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let report = BasicValidator.validate(&ir, &node(), &ctx()).expect("valid");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("prod"));
    }

    #[test]
    fn unresolved_containment_is_a_warning() {
        let mut orphan = component("comp");
        orphan.container_id = "missing".into();
        let ir = Ir {
            components: vec![orphan],
            ..Default::default()
        };

        let report = BasicValidator.validate(&ir, &node(), &ctx()).expect("valid");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("missing"));
    }
}
