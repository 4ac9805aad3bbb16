//! Builtin stage registry.
//!
//! Statically linked stage implementations register here under a
//! (kind, name) key; bare module specifiers in config are looked up in the
//! registry before any path resolution happens. This replaces arbitrary
//! dynamic code loading with an explicit mapping.

use archmap_shared::StageKind;

use crate::stage::Stage;

type StageFactory = Box<dyn Fn() -> Stage + Send + Sync>;

struct RegistryEntry {
    kind: StageKind,
    name: String,
    factory: StageFactory,
}

/// Holds builtin stage factories, keyed by stage kind and name.
#[derive(Default)]
pub struct StageRegistry {
    entries: Vec<RegistryEntry>,
}

impl StageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builtin under `kind`/`name`. The factory must produce a
    /// [`Stage`] of the matching capability; a mismatch is a programming
    /// error and panics at registration time.
    pub fn register(
        &mut self,
        kind: StageKind,
        name: impl Into<String>,
        factory: impl Fn() -> Stage + Send + Sync + 'static,
    ) {
        let name = name.into();
        assert_eq!(
            factory().kind(),
            kind,
            "builtin `{name}` registered under the wrong stage kind"
        );
        self.entries.push(RegistryEntry {
            kind,
            name,
            factory: Box::new(factory),
        });
    }

    /// Instantiate the builtin registered under `kind`/`name`, if any.
    pub fn get(&self, kind: StageKind, name: &str) -> Option<Stage> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .map(|e| (e.factory)())
    }

    /// Whether any builtin — under any kind — uses this name. Lets the
    /// loader distinguish "unknown module" from "known builtin, wrong kind".
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Names registered for one stage kind, in registration order.
    pub fn names_for(&self, kind: StageKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.as_str())
            .collect()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{}:{}", e.kind, e.name))
            .collect();
        f.debug_struct("StageRegistry").field("entries", &names).finish()
    }
}
