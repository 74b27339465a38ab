/// Registry Facade (C6): the operation surface consumed by the transport
/// layer. Every public method here corresponds to one row of the HTTP
/// table; none of them know about HTTP.
use crate::canonical;
use crate::compatibility::{self, CompatibilityPolicy};
use crate::coordinator::Coordinator;
use crate::error::{RegistryError, Result};
use crate::log::ConfigScopeOwned;
use crate::state_machine::{self, StateMachine};
use crate::store::{SchemaId, Store};
use std::sync::Arc;

/// Either a specific version number or the `latest` keyword, as accepted
/// by every endpoint that takes a version selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Number(u32),
}

impl VersionSelector {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == "latest" {
            return Ok(VersionSelector::Latest);
        }
        match raw.parse::<i64>() {
            Ok(n) if n > 0 => Ok(VersionSelector::Number(n as u32)),
            Ok(_) => Err(RegistryError::InvalidVersion(format!(
                "version selector must be positive or 'latest', got: {}",
                raw
            ))),
            Err(_) => Err(RegistryError::InvalidVersion(format!(
                "unrecognized version selector: {}",
                raw
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub subject: String,
    pub version_number: u32,
    pub schema_id: SchemaId,
    pub canonical_text: String,
}

pub struct Registry {
    store: Arc<Store>,
    state_machine: Arc<StateMachine>,
    coordinator: Arc<Coordinator>,
}

impl Registry {
    pub fn new(store: Arc<Store>, state_machine: Arc<StateMachine>, coordinator: Arc<Coordinator>) -> Self {
        Self { store, state_machine, coordinator }
    }

    /// Canonicalize, then intern/append under `subject`. Idempotent at
    /// the (subject, canonical_text) level: re-registering an existing
    /// schema returns its existing id without creating a new version.
    pub fn register(&self, subject: &str, text: &str) -> Result<SchemaId> {
        let candidate = canonical::parse(text)?;

        self.coordinator.with_write_lease(subject, || {
            if let Some(existing) = self
                .store
                .find_version_by_fingerprint(subject, &candidate.structural_fingerprint)
            {
                return Ok(existing.schema_id);
            }

            if let Some(latest) = self.store.latest_version(subject) {
                let latest_schema = self
                    .store
                    .get_schema_by_id(latest.schema_id)
                    .ok_or_else(|| RegistryError::Fatal("store inconsistency: latest version has no schema".to_string()))?;
                let policy = self.store.effective_policy(subject);
                let result = compatibility::check(&candidate, &latest_schema, policy);
                if !result.compatible {
                    return Err(RegistryError::IncompatibleSchema(
                        result.reason.unwrap_or_else(|| "schema rejected by compatibility engine".to_string()),
                    ));
                }
            }

            self.coordinator.ensure_still_primary()?;
            let command = state_machine::register_command(subject, &candidate.canonical_text);
            self.state_machine.commit(command)?;

            let schema_id = self
                .store
                .id_by_fingerprint(&candidate.structural_fingerprint)
                .ok_or_else(|| RegistryError::Fatal("replay did not intern the committed schema".to_string()))?;
            Ok(schema_id)
        })
    }

    pub fn get_schema_by_id(&self, schema_id: SchemaId) -> Result<String> {
        self.store
            .get_schema_by_id(schema_id)
            .map(|s| s.canonical_text)
            .ok_or_else(|| RegistryError::SchemaNotFound(format!("no schema with id {}", schema_id)))
    }

    pub fn get_version(&self, subject: &str, selector: VersionSelector) -> Result<VersionInfo> {
        if !self.store.has_subject(subject) {
            return Err(RegistryError::SubjectNotFound(subject.to_string()));
        }

        let version = match selector {
            VersionSelector::Latest => self
                .store
                .latest_version(subject)
                .ok_or_else(|| RegistryError::VersionNotFound(format!("subject '{}' has no versions", subject)))?,
            VersionSelector::Number(n) => self.store.get_version(subject, n).ok_or_else(|| {
                RegistryError::VersionNotFound(format!("subject '{}' has no version {}", subject, n))
            })?,
        };

        let schema = self
            .store
            .get_schema_by_id(version.schema_id)
            .ok_or_else(|| RegistryError::Fatal("store inconsistency: version points at unknown schema id".to_string()))?;

        Ok(VersionInfo {
            subject: subject.to_string(),
            version_number: version.version_number,
            schema_id: version.schema_id,
            canonical_text: schema.canonical_text,
        })
    }

    pub fn list_subjects(&self) -> Vec<String> {
        self.store.list_subjects()
    }

    pub fn list_versions(&self, subject: &str) -> Result<Vec<u32>> {
        self.store
            .list_versions(subject)
            .ok_or_else(|| RegistryError::SubjectNotFound(subject.to_string()))
    }

    pub fn lookup(&self, subject: &str, text: &str) -> Result<VersionInfo> {
        if !self.store.has_subject(subject) {
            return Err(RegistryError::SubjectNotFound(subject.to_string()));
        }
        let candidate = canonical::parse(text)?;
        let version = self
            .store
            .find_version_by_fingerprint(subject, &candidate.structural_fingerprint)
            .ok_or_else(|| RegistryError::SchemaNotFound(format!("no matching schema under subject '{}'", subject)))?;

        Ok(VersionInfo {
            subject: subject.to_string(),
            version_number: version.version_number,
            schema_id: version.schema_id,
            canonical_text: candidate.canonical_text,
        })
    }

    /// Never mutates state: a read-only structural check against the
    /// selected prior version.
    pub fn test_compatibility(&self, subject: &str, text: &str, selector: VersionSelector) -> Result<bool> {
        let target = self.get_version(subject, selector)?;
        let candidate = canonical::parse(text)?;
        let target_schema = canonical::parse(&target.canonical_text)?;
        let policy = self.store.effective_policy(subject);
        Ok(compatibility::check(&candidate, &target_schema, policy).compatible)
    }

    /// `Global` always returns a value. A specific subject returns its
    /// own config only if explicitly set — never the global fallback.
    pub fn get_config(&self, subject: Option<&str>) -> Result<Option<CompatibilityPolicy>> {
        match subject {
            None => Ok(Some(self.store.global_config())),
            Some(name) => Ok(self.store.subject_config(name)),
        }
    }

    pub fn set_config(&self, subject: Option<&str>, policy: CompatibilityPolicy) -> Result<()> {
        let scope_owned = match subject {
            None => ConfigScopeOwned::Global,
            Some(name) => ConfigScopeOwned::Subject(name.to_string()),
        };
        let command = state_machine::set_config_command(scope_owned, policy);
        self.state_machine.commit(command)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CommandLog, LogConfig};
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> Registry {
        let log = Arc::new(
            CommandLog::open(LogConfig {
                dir: dir.path().to_path_buf(),
                max_segment_bytes: 1024 * 1024,
                sync_on_write: false,
            })
            .unwrap(),
        );
        let store = Arc::new(Store::new());
        let state_machine = Arc::new(StateMachine::new(store.clone(), log));
        let coordinator = Arc::new(Coordinator::new(true));
        Registry::new(store, state_machine, coordinator)
    }

    #[test]
    fn basic_registration() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let id = reg.register("t1", r#"{"type":"string"}"#).unwrap();
        assert_eq!(id, 1);
        assert_eq!(reg.list_versions("t1").unwrap(), vec![1]);
        assert_eq!(reg.list_subjects(), vec!["t1".to_string()]);
    }

    #[test]
    fn same_schema_two_subjects_shares_id() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let id_a = reg.register("a", r#"{"type":"string"}"#).unwrap();
        let id_b = reg.register("b", r#"{"type":"string"}"#).unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(reg.list_versions("a").unwrap(), vec![1]);
        assert_eq!(reg.list_versions("b").unwrap(), vec![1]);
    }

    #[test]
    fn canonicalization_collapses_whitespace_variants() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let id1 = reg.register("t", "{   \"type\":   \"string\"}").unwrap();
        let id2 = reg.register("t", "{\"type\":\"string\"}").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(reg.list_versions("t").unwrap(), vec![1]);
    }

    #[test]
    fn incompatible_under_full_is_rejected() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.set_config(Some("s"), CompatibilityPolicy::Full).unwrap();
        let id = reg
            .register("s", r#"{"type":"record","name":"r","fields":[{"name":"f","type":"string"}]}"#)
            .unwrap();
        assert_eq!(id, 1);
        let result = reg.register("s", r#"{"type":"record","name":"r","fields":[{"name":"f","type":"int"}]}"#);
        assert!(matches!(result, Err(RegistryError::IncompatibleSchema(_))));
    }

    #[test]
    fn invalid_version_selectors() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.register("t", r#"{"type":"string"}"#).unwrap();

        assert!(matches!(VersionSelector::parse("earliest"), Err(RegistryError::InvalidVersion(_))));
        assert!(matches!(VersionSelector::parse("0"), Err(RegistryError::InvalidVersion(_))));

        let result = reg.get_version("t", VersionSelector::Number(200));
        assert!(matches!(result, Err(RegistryError::VersionNotFound(_))));
    }

    #[test]
    fn config_scoping_matches_scenario_six() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        assert_eq!(reg.get_config(None).unwrap(), Some(CompatibilityPolicy::None));

        reg.set_config(None, CompatibilityPolicy::Forward).unwrap();
        assert_eq!(reg.get_config(None).unwrap(), Some(CompatibilityPolicy::Forward));
        assert_eq!(reg.get_config(Some("s")).unwrap(), None);

        reg.set_config(Some("s"), CompatibilityPolicy::Forward).unwrap();
        assert_eq!(reg.get_config(Some("s")).unwrap(), Some(CompatibilityPolicy::Forward));
        assert_eq!(reg.get_config(None).unwrap(), Some(CompatibilityPolicy::Forward));
        assert!(!reg.list_subjects().contains(&"s".to_string()));
    }

    #[test]
    fn read_operations_do_not_advance_the_log() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.register("t", r#"{"type":"string"}"#).unwrap();
        let offset_before = reg.state_machine.store().next_schema_id_preview();
        let _ = reg.test_compatibility("t", r#"{"type":"string"}"#, VersionSelector::Latest);
        let _ = reg.lookup("t", r#"{"type":"string"}"#);
        let _ = reg.get_schema_by_id(1);
        let offset_after = reg.state_machine.store().next_schema_id_preview();
        assert_eq!(offset_before, offset_after);
    }
}
