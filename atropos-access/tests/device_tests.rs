use atropos_access::AccessStateStore;
use tempfile::TempDir;

#[test]
fn identity_is_stable_across_resolutions() {
    let dir = TempDir::new().unwrap();
    let store = AccessStateStore::new(dir.path().to_path_buf());

    let first = atropos_access::resolve_identity(&store).unwrap();
    let second = atropos_access::resolve_identity(&store).unwrap();
    assert_eq!(first, second);
}

#[test]
fn identity_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let first = {
        let store = AccessStateStore::new(dir.path().to_path_buf());
        atropos_access::resolve_identity(&store).unwrap()
    };

    // A fresh store over the same directory sees the same identity.
    let store = AccessStateStore::new(dir.path().to_path_buf());
    let second = atropos_access::resolve_identity(&store).unwrap();
    assert_eq!(first.device_hash, second.device_hash);
    assert_eq!(first.resolved_at, second.resolved_at);
}

#[test]
fn device_hash_has_canonical_shape() {
    let dir = TempDir::new().unwrap();
    let store = AccessStateStore::new(dir.path().to_path_buf());
    let identity = atropos_access::resolve_identity(&store).unwrap();

    let hash = identity.device_hash.as_str();
    assert_eq!(hash.len(), 32);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
