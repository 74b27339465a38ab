/// Log-Backed State Machine (C4): the replay/apply half. Owns the only
/// path by which the Store is mutated, so every node — primary or
/// replica — converges on identical state for identical log prefixes.
use crate::canonical;
use crate::compatibility::CompatibilityPolicy;
use crate::error::{RegistryError, Result};
use crate::log::{Command, CommandLog, ConfigScopeOwned};
use crate::store::{ConfigScope, Store};
use std::sync::Arc;

pub struct StateMachine {
    store: Arc<Store>,
    log: Arc<CommandLog>,
}

impl StateMachine {
    pub fn new(store: Arc<Store>, log: Arc<CommandLog>) -> Self {
        Self { store, log }
    }

    /// Replay the full log into the Store. Called once at startup before
    /// the node accepts requests, and again by a replica catching up.
    pub fn bootstrap(&self) -> Result<()> {
        tracing::info!("replaying command log to rebuild store state");
        let mut applied = 0u64;
        let log = Arc::clone(&self.log);
        let store = Arc::clone(&self.store);
        log.replay(|offset, command| {
            apply(&store, command);
            applied += 1;
            tracing::debug!(offset, "replayed command");
        })?;
        tracing::info!(applied, "bootstrap replay complete");
        Ok(())
    }

    /// Commit a new command: append to the log, then apply it locally.
    /// Only called by the primary write path (coordinator.rs enforces
    /// this); every node — including the primary — applies commands only
    /// through this same replay path, never by mutating the Store
    /// directly.
    pub fn commit(&self, command: Command) -> Result<u64> {
        let offset = self.log.append(command.clone())?;
        apply(&self.store, &command);
        Ok(offset)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

/// Deterministic replay rule for a single command. Identical for every
/// node regardless of which one produced the command.
fn apply(store: &Store, command: &Command) {
    match command {
        Command::RegisterSchema { subject, canonical_text } => {
            let parsed = match canonical::parse(canonical_text) {
                Ok(schema) => schema,
                Err(e) => {
                    // The primary validated this before appending; a
                    // parse failure here means the log itself is corrupt.
                    tracing::error!(error = %e, "fatal: log contains an unparsable canonical schema");
                    return;
                }
            };
            let schema_id = store.apply_intern_schema(parsed);
            store.apply_append_version(subject, schema_id);
        }
        Command::SetConfig { scope, policy } => {
            let scope = match scope {
                ConfigScopeOwned::Global => ConfigScope::Global,
                ConfigScopeOwned::Subject(name) => ConfigScope::Subject(name),
            };
            store.apply_set_config(scope, *policy);
        }
    }
}

/// Convert a canonicalized candidate into a `RegisterSchema` command,
/// to be validated by the caller before committing.
pub fn register_command(subject: &str, canonical_text: &str) -> Command {
    Command::RegisterSchema {
        subject: subject.to_string(),
        canonical_text: canonical_text.to_string(),
    }
}

pub fn set_config_command(scope: ConfigScopeOwned, policy: CompatibilityPolicy) -> Command {
    Command::SetConfig { scope, policy }
}

pub fn fatal_if_corrupt(result: Result<()>) -> Result<()> {
    if let Err(ref e) = result {
        if matches!(e, RegistryError::Fatal(_)) {
            tracing::error!(error = %e, "halting: log corruption or invariant violation detected during replay");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogConfig;
    use tempfile::TempDir;

    fn machine(dir: &TempDir) -> StateMachine {
        let log = Arc::new(
            CommandLog::open(LogConfig {
                dir: dir.path().to_path_buf(),
                max_segment_bytes: 1024 * 1024,
                sync_on_write: false,
            })
            .unwrap(),
        );
        StateMachine::new(Arc::new(Store::new()), log)
    }

    #[test]
    fn commit_then_bootstrap_on_a_fresh_store_reproduces_state() {
        let dir = TempDir::new().unwrap();
        let machine = machine(&dir);
        machine
            .commit(register_command("t1", "\"string\""))
            .unwrap();
        let id = machine.store().id_by_fingerprint(
            &canonical::parse("\"string\"").unwrap().structural_fingerprint,
        );
        assert_eq!(id, Some(1));

        let fresh = StateMachine::new(Arc::new(Store::new()), machine.log.clone());
        fresh.bootstrap().unwrap();
        assert_eq!(
            fresh.store().id_by_fingerprint(
                &canonical::parse("\"string\"").unwrap().structural_fingerprint
            ),
            Some(1)
        );
        assert_eq!(fresh.store().list_versions("t1"), Some(vec![1]));
    }

    #[test]
    fn cross_subject_registration_shares_the_same_id() {
        let dir = TempDir::new().unwrap();
        let machine = machine(&dir);
        machine.commit(register_command("a", "\"string\"")).unwrap();
        machine.commit(register_command("b", "\"string\"")).unwrap();
        let fp = canonical::parse("\"string\"").unwrap().structural_fingerprint;
        let id_a = machine.store().find_version_by_fingerprint("a", &fp).unwrap();
        let id_b = machine.store().find_version_by_fingerprint("b", &fp).unwrap();
        assert_eq!(id_a.schema_id, id_b.schema_id);
        assert_eq!(id_b.version_number, 1);
    }
}
