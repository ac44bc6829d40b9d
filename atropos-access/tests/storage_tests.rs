use atropos_access::{
    AccessError, AccessStateStore, CachedEntitlement, PendingConsumption, PendingStage,
};
use atropos_types::{ConsumptionId, DeviceHash, EntitlementSnapshot, Epoch, SubscriptionStatus};
use chrono::Utc;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn store(dir: &TempDir) -> AccessStateStore {
    AccessStateStore::new(dir.path().to_path_buf())
}

fn device() -> DeviceHash {
    DeviceHash::new("0123456789abcdef0123456789abcdef").unwrap()
}

#[test]
fn entitlement_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let cached = CachedEntitlement {
        snapshot: EntitlementSnapshot {
            status: Some(SubscriptionStatus::Active),
            trial: None,
            epoch: Epoch::new(5),
            fetched_at: Utc::now(),
        },
        last_verified_at: Utc::now(),
    };

    store.save_entitlement(&cached).unwrap();
    let loaded = store.load_entitlement().unwrap().unwrap();
    assert_eq!(loaded, cached);
}

#[test]
fn missing_files_load_as_none() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert!(store.load_identity().unwrap().is_none());
    assert!(store.load_entitlement().unwrap().is_none());
    assert!(store.load_pending().unwrap().is_none());
}

#[test]
fn pending_journal_round_trips_and_clears() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let record = PendingConsumption {
        id: ConsumptionId::new(),
        device_hash: device(),
        stage: PendingStage::InProgress,
        marked_at: Utc::now(),
    };

    store.save_pending(&record).unwrap();
    assert_eq!(store.load_pending().unwrap().unwrap(), record);

    store.clear_pending().unwrap();
    assert!(store.load_pending().unwrap().is_none());
    // Clearing twice is fine.
    store.clear_pending().unwrap();
}

#[test]
fn corrupt_journal_degrades_to_none() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    fs::write(dir.path().join("pending_consumption.json"), b"{ torn").unwrap();

    assert!(store.load_pending().unwrap().is_none());
    // The unreadable file is gone; a fresh journal can be written.
    assert!(!dir.path().join("pending_consumption.json").exists());
}

#[test]
fn corrupt_entitlement_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    fs::write(dir.path().join("entitlement.json"), b"not json").unwrap();

    let err = store.load_entitlement().unwrap_err();
    assert!(matches!(err, AccessError::Storage(_)), "got {err:?}");
}

#[test]
fn writes_leave_no_temp_files_behind() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let record = PendingConsumption {
        id: ConsumptionId::new(),
        device_hash: device(),
        stage: PendingStage::Finalizing,
        marked_at: Utc::now(),
    };
    store.save_pending(&record).unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
