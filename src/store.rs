/// Store (C3): the process-resident index of schemas, subjects, and
/// compatibility configuration. All mutation is funneled through the
/// crate-private `apply_*` methods, called exclusively by the replay
/// handler in `state_machine.rs`; every other caller only reads.
use crate::canonical::CanonicalSchema;
use crate::compatibility::CompatibilityPolicy;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;

pub type SchemaId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope<'a> {
    Global,
    Subject(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectVersion {
    pub version_number: u32,
    pub schema_id: SchemaId,
}

#[derive(Debug, Default)]
struct StoreState {
    schemas_by_id: HashMap<SchemaId, CanonicalSchema>,
    id_by_fingerprint: HashMap<String, SchemaId>,
    subjects: IndexMap<String, Vec<SubjectVersion>>,
    global_config: Option<CompatibilityPolicy>,
    subject_config: HashMap<String, CompatibilityPolicy>,
    next_schema_id: SchemaId,
}

/// Snapshot of the store shared across facade, coordinator, and state
/// machine. Readers take a consistent view under the lock; the state
/// machine is the only writer.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<StoreState>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                next_schema_id: 1,
                ..Default::default()
            }),
        }
    }

    // ---- reads ----

    pub fn get_schema_by_id(&self, id: SchemaId) -> Option<CanonicalSchema> {
        self.state.read().schemas_by_id.get(&id).cloned()
    }

    pub fn id_by_fingerprint(&self, fingerprint: &str) -> Option<SchemaId> {
        self.state.read().id_by_fingerprint.get(fingerprint).copied()
    }

    pub fn list_subjects(&self) -> Vec<String> {
        self.state.read().subjects.keys().cloned().collect()
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.state.read().subjects.contains_key(subject)
    }

    pub fn list_versions(&self, subject: &str) -> Option<Vec<u32>> {
        self.state
            .read()
            .subjects
            .get(subject)
            .map(|versions| versions.iter().map(|v| v.version_number).collect())
    }

    pub fn get_version(&self, subject: &str, version_number: u32) -> Option<SubjectVersion> {
        self.state
            .read()
            .subjects
            .get(subject)?
            .iter()
            .find(|v| v.version_number == version_number)
            .cloned()
    }

    pub fn latest_version(&self, subject: &str) -> Option<SubjectVersion> {
        self.state.read().subjects.get(subject)?.last().cloned()
    }

    pub fn find_version_by_fingerprint(&self, subject: &str, fingerprint: &str) -> Option<SubjectVersion> {
        let state = self.state.read();
        let versions = state.subjects.get(subject)?;
        versions.iter().find_map(|v| {
            let schema = state.schemas_by_id.get(&v.schema_id)?;
            if schema.structural_fingerprint == fingerprint {
                Some(v.clone())
            } else {
                None
            }
        })
    }

    pub fn global_config(&self) -> CompatibilityPolicy {
        self.state.read().global_config.unwrap_or(CompatibilityPolicy::None)
    }

    /// True once a `SetConfig{Global, ..}` command has been replayed at
    /// least once. Used at bootstrap to decide whether to seed the
    /// configured default without overwriting an operator's prior choice.
    pub fn global_config_is_set(&self) -> bool {
        self.state.read().global_config.is_some()
    }

    pub fn subject_config(&self, subject: &str) -> Option<CompatibilityPolicy> {
        self.state.read().subject_config.get(subject).copied()
    }

    /// The effective policy for a subject: its own config if set, else global.
    pub fn effective_policy(&self, subject: &str) -> CompatibilityPolicy {
        self.subject_config(subject).unwrap_or_else(|| self.global_config())
    }

    pub fn next_schema_id_preview(&self) -> SchemaId {
        self.state.read().next_schema_id
    }

    // ---- mutation, restricted to the replay handler ----

    /// Record a new canonical schema, assigning it an id if its
    /// fingerprint has never been observed. Returns the (possibly reused)
    /// schema id.
    pub(crate) fn apply_intern_schema(&self, schema: CanonicalSchema) -> SchemaId {
        let mut state = self.state.write();
        if let Some(&existing_id) = state.id_by_fingerprint.get(&schema.structural_fingerprint) {
            return existing_id;
        }
        let id = state.next_schema_id;
        state.next_schema_id += 1;
        state.id_by_fingerprint.insert(schema.structural_fingerprint.clone(), id);
        state.schemas_by_id.insert(id, schema);
        id
    }

    /// Append a new version to `subject` pointing at `schema_id`, unless
    /// the subject already has a version with the same schema id (no-op
    /// registration). Returns the version that now represents this schema
    /// under the subject.
    pub(crate) fn apply_append_version(&self, subject: &str, schema_id: SchemaId) -> SubjectVersion {
        let mut state = self.state.write();
        let versions = state.subjects.entry(subject.to_string()).or_default();
        if let Some(existing) = versions.iter().find(|v| v.schema_id == schema_id) {
            return existing.clone();
        }
        let version = SubjectVersion {
            version_number: versions.len() as u32 + 1,
            schema_id,
        };
        versions.push(version.clone());
        version
    }

    /// Overwrite the targeted scope's config. For a subject scope, this
    /// creates the config entry even if the subject has no schemas yet,
    /// without adding it to the `subjects` index (§9 open question:
    /// subjects only appear via successful registration).
    pub(crate) fn apply_set_config(&self, scope: ConfigScope<'_>, policy: CompatibilityPolicy) {
        let mut state = self.state.write();
        match scope {
            ConfigScope::Global => state.global_config = Some(policy),
            ConfigScope::Subject(name) => {
                state.subject_config.insert(name.to_string(), policy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::parse;

    #[test]
    fn interning_the_same_fingerprint_reuses_the_id() {
        let store = Store::new();
        let a = parse(r#"{"type":"string"}"#).unwrap();
        let b = parse(r#"{   "type":  "string" }"#).unwrap();
        let id_a = store.apply_intern_schema(a);
        let id_b = store.apply_intern_schema(b);
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn ids_are_assigned_monotonically() {
        let store = Store::new();
        let a = store.apply_intern_schema(parse(r#"{"type":"string"}"#).unwrap());
        let b = store.apply_intern_schema(parse(r#"{"type":"int"}"#).unwrap());
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn versions_are_contiguous_per_subject() {
        let store = Store::new();
        let id = store.apply_intern_schema(parse(r#"{"type":"string"}"#).unwrap());
        let v1 = store.apply_append_version("t", id);
        assert_eq!(v1.version_number, 1);
        let id2 = store.apply_intern_schema(parse(r#"{"type":"int"}"#).unwrap());
        let v2 = store.apply_append_version("t", id2);
        assert_eq!(v2.version_number, 2);
    }

    #[test]
    fn reregistering_same_schema_under_subject_does_not_add_a_version() {
        let store = Store::new();
        let id = store.apply_intern_schema(parse(r#"{"type":"string"}"#).unwrap());
        store.apply_append_version("t", id);
        store.apply_append_version("t", id);
        assert_eq!(store.list_versions("t").unwrap().len(), 1);
    }

    #[test]
    fn global_config_defaults_to_none() {
        let store = Store::new();
        assert_eq!(store.global_config(), CompatibilityPolicy::None);
    }

    #[test]
    fn subject_config_falls_back_to_global_when_absent() {
        let store = Store::new();
        store.apply_set_config(ConfigScope::Global, CompatibilityPolicy::Forward);
        assert_eq!(store.effective_policy("unset-subject"), CompatibilityPolicy::Forward);
    }

    #[test]
    fn set_config_does_not_register_subject_in_list_subjects() {
        let store = Store::new();
        store.apply_set_config(ConfigScope::Subject("s"), CompatibilityPolicy::Forward);
        assert!(store.list_subjects().is_empty());
        assert_eq!(store.subject_config("s"), Some(CompatibilityPolicy::Forward));
    }
}
