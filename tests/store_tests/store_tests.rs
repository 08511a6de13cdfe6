//! Project Store Tests
//!
//! Tests verify:
//! - Version monotonicity and exact-version lookup
//! - Listing by owner
//! - Owner and project ids cannot alias each other's keys
//! - Concurrent puts never lose a version (memory and embedded backends)
//! - Backend failures propagate and never expose an unstored version

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use pretty_assertions::assert_eq;
use sitesmith::config::Config;
use sitesmith::kv::{MemoryKv, MAX_KEY_BYTES};
use sitesmith::{
    Engine, FileEntry, KvBackend, KvProjectStore, Manifest, ProjectStore, ProjectSummary, Result,
    SiteError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn site(title: &str) -> Manifest {
    Manifest {
        entry: "index.html".to_string(),
        files: vec![FileEntry::new(
            "index.html",
            format!("<!doctype html><title>{}</title>", title),
        )],
    }
}

fn memory_store() -> KvProjectStore<MemoryKv> {
    KvProjectStore::new(MemoryKv::new())
}

fn setup_temp_engine_store() -> (TempDir, Arc<KvProjectStore<Engine>>) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(Config::builder().data_dir(temp_dir.path()).build()).unwrap();
    (temp_dir, Arc::new(KvProjectStore::new(engine)))
}

/// Fire two puts at the same project at the same moment
fn race_two_puts<S: ProjectStore + 'static>(store: Arc<S>) -> Vec<u64> {
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["first", "second"]
        .into_iter()
        .map(|title| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.put("ada", "blog", &site(title)).unwrap()
            })
        })
        .collect();

    let mut versions: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    versions.sort();
    versions
}

// =============================================================================
// Versioning Tests
// =============================================================================

#[test]
fn test_unknown_project_has_version_zero() {
    let store = memory_store();

    assert_eq!(store.latest_version("ada", "blog").unwrap(), 0);
    assert_eq!(store.get("ada", "blog", 1).unwrap(), None);
    assert_eq!(store.get("ada", "blog", 0).unwrap(), None);
}

#[test]
fn test_sequential_puts_are_monotonic() {
    let store = memory_store();

    let versions: Vec<u64> = (1..=5)
        .map(|i| store.put("ada", "blog", &site(&format!("v{}", i))).unwrap())
        .collect();

    assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    for version in versions {
        assert_eq!(
            store.get("ada", "blog", version).unwrap(),
            Some(site(&format!("v{}", version)))
        );
    }
    assert_eq!(store.latest_version("ada", "blog").unwrap(), 5);
}

#[test]
fn test_versions_are_per_owner_and_project() {
    let store = memory_store();

    assert_eq!(store.put("ada", "blog", &site("a")).unwrap(), 1);
    assert_eq!(store.put("ada", "shop", &site("b")).unwrap(), 1);
    assert_eq!(store.put("grace", "blog", &site("c")).unwrap(), 1);
    assert_eq!(store.put("ada", "blog", &site("d")).unwrap(), 2);

    assert_eq!(store.get("grace", "blog", 1).unwrap(), Some(site("c")));
}

#[test]
fn test_manifest_stored_as_json() {
    let store = memory_store();
    store.put("ada", "blog", &site("json")).unwrap();

    let raw = store.backend().get(b"project:3:ada:4:blog:v1").unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();

    assert_eq!(value["entry"], "index.html");
    assert_eq!(store.backend().get(b"project:3:ada:4:blog:seq").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.backend().get(b"project:3:ada:4:blog:version").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_ids_containing_separators_do_not_alias() {
    let store = memory_store();

    assert_eq!(store.put("a:b", "c", &site("first owner")).unwrap(), 1);
    assert_eq!(store.put("a", "b:c", &site("second owner")).unwrap(), 1);

    assert_eq!(store.get("a:b", "c", 1).unwrap(), Some(site("first owner")));
    assert_eq!(store.get("a", "b:c", 1).unwrap(), Some(site("second owner")));
    assert_eq!(store.latest_version("a:b", "c").unwrap(), 1);
    assert_eq!(store.latest_version("a", "b:c").unwrap(), 1);
    assert_eq!(
        store.list("a").unwrap(),
        vec![ProjectSummary { project_id: "b:c".to_string(), last_version: 1 }]
    );
}

// =============================================================================
// Listing Tests
// =============================================================================

#[test]
fn test_list_reports_latest_versions_sorted() {
    let store = memory_store();
    store.put("ada", "shop", &site("s1")).unwrap();
    store.put("ada", "blog", &site("b1")).unwrap();
    store.put("ada", "blog", &site("b2")).unwrap();
    store.put("grace", "notes", &site("n1")).unwrap();

    assert_eq!(
        store.list("ada").unwrap(),
        vec![
            ProjectSummary { project_id: "blog".to_string(), last_version: 2 },
            ProjectSummary { project_id: "shop".to_string(), last_version: 1 },
        ]
    );
}

#[test]
fn test_list_unknown_owner_is_empty() {
    assert!(memory_store().list("nobody").unwrap().is_empty());
}

#[test]
fn test_summary_serializes_camel_case() {
    let summary = ProjectSummary { project_id: "blog".to_string(), last_version: 3 };

    assert_eq!(
        serde_json::to_string(&summary).unwrap(),
        r#"{"projectId":"blog","lastVersion":3}"#
    );
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_puts_memory_backend() {
    let store = Arc::new(memory_store());

    let versions = race_two_puts(Arc::clone(&store));

    assert_eq!(versions, vec![1, 2]);
    assert_eq!(store.latest_version("ada", "blog").unwrap(), 2);
    let stored: Vec<Manifest> = (1..=2)
        .map(|v| store.get("ada", "blog", v).unwrap().unwrap())
        .collect();
    assert!(stored.contains(&site("first")));
    assert!(stored.contains(&site("second")));
}

#[test]
fn test_concurrent_puts_embedded_backend() {
    let (_temp, store) = setup_temp_engine_store();

    let versions = race_two_puts(Arc::clone(&store));

    assert_eq!(versions, vec![1, 2]);
    assert_eq!(store.latest_version("ada", "blog").unwrap(), 2);
    assert!(store.get("ada", "blog", 1).unwrap().is_some());
    assert!(store.get("ada", "blog", 2).unwrap().is_some());
}

#[test]
fn test_many_concurrent_puts_are_all_retrievable() {
    let store = Arc::new(memory_store());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.put("ada", "blog", &site(&i.to_string())).unwrap())
        })
        .collect();
    let mut versions: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    versions.sort();

    assert_eq!(versions, (1..=16).collect::<Vec<_>>());
    for v in versions {
        assert!(store.get("ada", "blog", v).unwrap().is_some());
    }
}

#[test]
fn test_embedded_store_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).build();
    {
        let store = KvProjectStore::new(Engine::open(config.clone()).unwrap());
        store.put("ada", "blog", &site("one")).unwrap();
        store.put("ada", "blog", &site("two")).unwrap();
    }

    let store = KvProjectStore::new(Engine::open(config).unwrap());

    assert_eq!(store.latest_version("ada", "blog").unwrap(), 2);
    assert_eq!(store.put("ada", "blog", &site("three")).unwrap(), 3);
    assert_eq!(store.get("ada", "blog", 2).unwrap(), Some(site("two")));
}

// =============================================================================
// Failure Tests
// =============================================================================

/// Memory backend whose `set` can be switched off
struct FlakyKv {
    inner: MemoryKv,
    fail_sets: AtomicBool,
}

impl FlakyKv {
    fn new() -> Self {
        Self { inner: MemoryKv::new(), fail_sets: AtomicBool::new(false) }
    }
}

impl KvBackend for FlakyKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(SiteError::Persistence("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn increment_and_get(&self, key: &[u8]) -> Result<u64> {
        self.inner.increment_and_get(key)
    }

    fn raise_to(&self, key: &[u8], value: u64) -> Result<u64> {
        self.inner.raise_to(key, value)
    }

    fn add_to_set(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        self.inner.add_to_set(key, member)
    }

    fn members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.inner.members(key)
    }
}

#[test]
fn test_failed_manifest_write_keeps_latest_version() {
    let store = KvProjectStore::new(FlakyKv::new());
    assert_eq!(store.put("ada", "blog", &site("one")).unwrap(), 1);

    store.backend().fail_sets.store(true, Ordering::SeqCst);
    assert!(store.put("ada", "blog", &site("lost")).is_err());

    assert_eq!(store.latest_version("ada", "blog").unwrap(), 1);
    assert_eq!(
        store.list("ada").unwrap(),
        vec![ProjectSummary { project_id: "blog".to_string(), last_version: 1 }]
    );
    assert_eq!(store.get("ada", "blog", 2).unwrap(), None);

    // The failed reservation leaves a gap; versions are never reused
    store.backend().fail_sets.store(false, Ordering::SeqCst);
    assert_eq!(store.put("ada", "blog", &site("three")).unwrap(), 3);
    assert_eq!(store.latest_version("ada", "blog").unwrap(), 3);
}

#[test]
fn test_failed_first_put_lists_nothing() {
    let store = KvProjectStore::new(FlakyKv::new());
    store.backend().fail_sets.store(true, Ordering::SeqCst);

    assert!(store.put("ada", "blog", &site("lost")).is_err());

    assert_eq!(store.latest_version("ada", "blog").unwrap(), 0);
    assert!(store.list("ada").unwrap().is_empty());
}

#[test]
fn test_oversized_key_rejected_before_reserving() {
    let store = memory_store();
    let owner = "o".repeat(MAX_KEY_BYTES);

    let err = store.put(&owner, "blog", &site("x")).unwrap_err();

    assert!(matches!(err, SiteError::Persistence(_)));
    assert!(store.backend().is_empty());
}

/// Backend whose writes always fail
struct ReadOnlyKv;

impl KvBackend for ReadOnlyKv {
    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(SiteError::Persistence("read-only".to_string()))
    }

    fn increment_and_get(&self, _key: &[u8]) -> Result<u64> {
        Err(SiteError::Persistence("read-only".to_string()))
    }

    fn raise_to(&self, _key: &[u8], _value: u64) -> Result<u64> {
        Err(SiteError::Persistence("read-only".to_string()))
    }

    fn add_to_set(&self, _key: &[u8], _member: &[u8]) -> Result<bool> {
        Err(SiteError::Persistence("read-only".to_string()))
    }

    fn members(&self, _key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_backend_write_failure_propagates() {
    let store = KvProjectStore::new(ReadOnlyKv);

    let err = store.put("ada", "blog", &site("x")).unwrap_err();

    assert!(matches!(err, SiteError::Persistence(_)));
    assert_eq!(store.latest_version("ada", "blog").unwrap(), 0);
}
