//! IR aggregation: merges independently produced fragments into one model.
//!
//! The aggregator is deliberately permissive — it never rejects a fragment
//! on data shape. It merges what is structurally present and leaves all
//! semantic checks (dangling references, schema conformance) to the
//! validation stage.
//!
//! Merge rules:
//! - Entities dedup per collection by declared id, falling back to the
//!   normalized name when an extractor could not derive a stable id. The
//!   first occurrence in fragment order is canonical; later occurrences
//!   contribute missing description segments and tags only.
//! - Relationships dedup by (source, destination, stereotype); descriptions
//!   merge and technology sets union.
//! - Deployments concatenate without dedup — extractors are assumed to own
//!   disjoint environments, and the builtin validator flags duplicates
//!   instead of silently collapsing them here.
//!
//! Aggregation is idempotent and its entity identity is insensitive to
//! fragment order; only the ordering of merged description segments depends
//! on input order, which is an accepted property of the format.

use std::collections::HashMap;

use tracing::{debug, instrument};

use archmap_shared::{Actor, CodeItem, Component, Container, Ir, Relationship};

/// Separator between merged description segments.
const DESCRIPTION_SEPARATOR: &str = " | ";

/// Merge fragments into a single IR, in the given order.
#[instrument(skip_all, fields(fragments = fragments.len()))]
pub fn aggregate(fragments: Vec<Ir>) -> Ir {
    let mut out = Ir::default();

    let mut actors = CollectionMerger::new();
    let mut containers = CollectionMerger::new();
    let mut components = CollectionMerger::new();
    let mut code = CollectionMerger::new();
    let mut relationships = RelationshipMerger::new();

    for fragment in fragments {
        if out.name.is_empty() && !fragment.name.is_empty() {
            out.name = fragment.name;
        }
        if out.description.is_empty() && !fragment.description.is_empty() {
            out.description = fragment.description;
        }
        if out.timestamp.is_none() {
            out.timestamp = fragment.timestamp;
        }

        for actor in fragment.actors {
            actors.merge(actor);
        }
        for container in fragment.containers {
            containers.merge(container);
        }
        for component in fragment.components {
            components.merge(component);
        }
        for item in fragment.code {
            code.merge(item);
        }
        for relationship in fragment.relationships {
            relationships.merge(relationship);
        }

        // Assumed disjoint per extractor; the validator flags duplicates.
        out.deployments.extend(fragment.deployments);
    }

    out.actors = actors.into_vec();
    out.containers = containers.into_vec();
    out.components = components.into_vec();
    out.code = code.into_vec();
    out.relationships = relationships.into_vec();

    debug!(
        entities = out.entity_count(),
        relationships = out.relationships.len(),
        deployments = out.deployments.len(),
        "aggregation complete"
    );

    out
}

// ---------------------------------------------------------------------------
// Entity merging
// ---------------------------------------------------------------------------

/// Merge behavior for one entity collection.
trait MergeEntity {
    /// Stable identity: the declared id, or the normalized name when the id
    /// is empty.
    fn merge_key(&self) -> String;

    /// Fold a duplicate into the canonical record. Scalar fields stay
    /// first-writer-wins; only descriptions and tag sets accumulate.
    fn absorb(&mut self, other: Self);
}

/// Order-preserving keyed merger: first occurrence wins the slot.
struct CollectionMerger<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: MergeEntity> CollectionMerger<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn merge(&mut self, item: T) {
        let key = item.merge_key();
        match self.index.get(&key) {
            Some(&slot) => self.items[slot].absorb(item),
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(item);
            }
        }
    }

    fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl MergeEntity for Actor {
    fn merge_key(&self) -> String {
        entity_key(&self.id, &self.name)
    }

    fn absorb(&mut self, other: Self) {
        merge_description(&mut self.description, &other.description);
    }
}

impl MergeEntity for Container {
    fn merge_key(&self) -> String {
        entity_key(&self.id, &self.name)
    }

    fn absorb(&mut self, other: Self) {
        merge_description(&mut self.description, &other.description);
        self.tags.extend(other.tags);
        if self.technology.is_none() {
            self.technology = other.technology;
        }
    }
}

impl MergeEntity for Component {
    fn merge_key(&self) -> String {
        entity_key(&self.id, &self.name)
    }

    fn absorb(&mut self, other: Self) {
        merge_description(&mut self.description, &other.description);
        self.tags.extend(other.tags);
    }
}

impl MergeEntity for CodeItem {
    fn merge_key(&self) -> String {
        entity_key(&self.id, &self.name)
    }

    fn absorb(&mut self, other: Self) {
        merge_description(&mut self.description, &other.description);
        if self.location.is_none() {
            self.location = other.location;
        }
        if self.signature.is_none() {
            self.signature = other.signature;
        }
    }
}

fn entity_key(id: &str, name: &str) -> String {
    if id.is_empty() {
        format!("name:{}", normalize_name(name))
    } else {
        format!("id:{id}")
    }
}

/// Case-fold and collapse whitespace so "Payment  Service" and
/// "payment service" identify the same entity.
fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Append each incoming segment that is non-empty and not already present.
/// Segment-wise (rather than whole-string) comparison keeps re-aggregation
/// of an already-merged description from growing it.
fn merge_description(accumulated: &mut String, incoming: &str) {
    for segment in incoming.split(DESCRIPTION_SEPARATOR) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let already_present = accumulated
            .split(DESCRIPTION_SEPARATOR)
            .any(|existing| existing.trim() == segment);
        if already_present {
            continue;
        }
        if accumulated.is_empty() {
            accumulated.push_str(segment);
        } else {
            accumulated.push_str(DESCRIPTION_SEPARATOR);
            accumulated.push_str(segment);
        }
    }
}

// ---------------------------------------------------------------------------
// Relationship merging
// ---------------------------------------------------------------------------

/// Keyed on (source, destination, stereotype). Self-referential edges are
/// kept — filtering them is a generator concern, not an aggregation one.
struct RelationshipMerger {
    items: Vec<Relationship>,
    index: HashMap<(String, String, String), usize>,
}

impl RelationshipMerger {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn merge(&mut self, rel: Relationship) {
        let key = (
            rel.source_id.clone(),
            rel.destination_id.clone(),
            rel.stereotype.clone(),
        );
        match self.index.get(&key) {
            Some(&slot) => {
                let canonical = &mut self.items[slot];
                merge_description(&mut canonical.description, &rel.description);
                canonical.technology.extend(rel.technology);
            }
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(rel);
            }
        }
    }

    fn into_vec(self) -> Vec<Relationship> {
        self.items
    }
}
