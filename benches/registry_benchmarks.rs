use criterion::{black_box, criterion_group, criterion_main, Criterion};
use registry_core::compatibility::CompatibilityPolicy;
use registry_core::coordinator::Coordinator;
use registry_core::log::{CommandLog, LogConfig};
use registry_core::registry::Registry;
use registry_core::state_machine::StateMachine;
use registry_core::store::Store;
use std::sync::Arc;
use tempfile::TempDir;

fn build_registry(dir: &TempDir) -> Registry {
    let log = Arc::new(
        CommandLog::open(LogConfig {
            dir: dir.path().to_path_buf(),
            max_segment_bytes: 64 * 1024 * 1024,
            sync_on_write: false,
        })
        .unwrap(),
    );
    let store = Arc::new(Store::new());
    let state_machine = Arc::new(StateMachine::new(store.clone(), log));
    let coordinator = Arc::new(Coordinator::new(true));
    Registry::new(store, state_machine, coordinator)
}

fn bench_register_new_schema(c: &mut Criterion) {
    c.bench_function("register_new_schema_per_subject", |b| {
        let dir = TempDir::new().unwrap();
        let registry = build_registry(&dir);
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let subject = format!("subject-{}", i);
            let schema = format!(
                r#"{{"type":"record","name":"r","fields":[{{"name":"f","type":"string"}},{{"name":"n","type":"long","default":{}}}]}}"#,
                i
            );
            black_box(registry.register(&subject, &schema).unwrap());
        });
    });
}

fn bench_register_duplicate_schema(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let registry = build_registry(&dir);
    registry.register("dup", r#"{"type":"string"}"#).unwrap();

    c.bench_function("register_duplicate_schema_is_idempotent", |b| {
        b.iter(|| {
            black_box(registry.register("dup", r#"{"type":"string"}"#).unwrap());
        });
    });
}

fn bench_compatibility_check(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let registry = build_registry(&dir);
    registry.set_config(Some("compat"), CompatibilityPolicy::Full).unwrap();
    registry
        .register(
            "compat",
            r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"},{"name":"b","type":"int"}]}"#,
        )
        .unwrap();

    c.bench_function("test_compatibility_against_latest", |b| {
        b.iter(|| {
            black_box(
                registry
                    .test_compatibility(
                        "compat",
                        r#"{"type":"record","name":"r","fields":[{"name":"a","type":"string"},{"name":"b","type":"long"}]}"#,
                        registry_core::registry::VersionSelector::Latest,
                    )
                    .unwrap(),
            );
        });
    });
}

criterion_group!(
    benches,
    bench_register_new_schema,
    bench_register_duplicate_schema,
    bench_compatibility_check
);
criterion_main!(benches);
