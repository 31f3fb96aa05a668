use fonoregistry::{Registry, TrackStatus};
use tempfile::TempDir;

fn create_test_registry() -> (TempDir, Registry) {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Registry::init(&temp_dir.path().join("registry.db")).unwrap();
    (temp_dir, registry)
}

#[test]
fn test_create_and_get() {
    let (_temp_dir, registry) = create_test_registry();

    let track = registry
        .create(
            "dQw4w9WgXcQ",
            Some("alice"),
            "dQw4w9WgXcQ_alice.mp3",
            TrackStatus::Downloading,
            0,
        )
        .unwrap();

    assert_eq!(track.content_id, "dQw4w9WgXcQ");
    assert_eq!(track.owner_id.as_deref(), Some("alice"));
    assert_eq!(track.status, TrackStatus::Downloading);
    assert_eq!(track.progress, 0);
    assert!(!track.shared);
    assert!(!track.in_durable_tier);

    let fetched = registry.get(track.id).unwrap();
    assert_eq!(fetched.locator, "dQw4w9WgXcQ_alice.mp3");
}

#[test]
fn test_content_owner_pair_is_unique() {
    let (_temp_dir, registry) = create_test_registry();

    registry
        .create("dQw4w9WgXcQ", Some("alice"), "a.mp3", TrackStatus::Downloading, 0)
        .unwrap();

    // Même couple (content_id, owner_id) : violation d'unicité
    let duplicate = registry.create(
        "dQw4w9WgXcQ",
        Some("alice"),
        "a.mp3",
        TrackStatus::Downloading,
        0,
    );
    assert!(duplicate.is_err());

    // Un autre propriétaire peut avoir sa propre ligne pour le même contenu
    let other = registry.create(
        "dQw4w9WgXcQ",
        Some("bob"),
        "a.mp3",
        TrackStatus::Ready,
        100,
    );
    assert!(other.is_ok());
}

#[test]
fn test_status_transitions_are_monotonic() {
    let (_temp_dir, registry) = create_test_registry();

    let track = registry
        .create("aaaaaaaaaaa", Some("alice"), "a.mp3", TrackStatus::Downloading, 0)
        .unwrap();

    assert!(registry
        .update_status(track.id, TrackStatus::Processing, 80)
        .unwrap());
    assert!(registry
        .update_status(track.id, TrackStatus::Ready, 100)
        .unwrap());

    // Une ligne ready est terminale
    assert!(!registry
        .update_status(track.id, TrackStatus::Error, 0)
        .unwrap());
    assert_eq!(registry.get(track.id).unwrap().status, TrackStatus::Ready);
}

#[test]
fn test_error_row_never_becomes_ready() {
    let (_temp_dir, registry) = create_test_registry();

    let track = registry
        .create("bbbbbbbbbbb", Some("alice"), "b.mp3", TrackStatus::Downloading, 0)
        .unwrap();

    assert!(registry.update_status(track.id, TrackStatus::Error, 0).unwrap());

    // Aucune transition ne ressort de l'état error
    assert!(!registry
        .update_status(track.id, TrackStatus::Ready, 100)
        .unwrap());
    let fetched = registry.get(track.id).unwrap();
    assert_eq!(fetched.status, TrackStatus::Error);
    assert_eq!(fetched.progress, 0);
}

#[test]
fn test_get_ready_by_content_id_across_owners() {
    let (_temp_dir, registry) = create_test_registry();

    registry
        .create("ccccccccccc", Some("alice"), "c.mp3", TrackStatus::Downloading, 0)
        .unwrap();
    assert!(registry
        .get_ready_by_content_id("ccccccccccc")
        .unwrap()
        .is_none());

    let bob = registry
        .create("ccccccccccc", Some("bob"), "c.mp3", TrackStatus::Ready, 100)
        .unwrap();

    let found = registry
        .get_ready_by_content_id("ccccccccccc")
        .unwrap()
        .expect("bob's ready row should be found");
    assert_eq!(found.id, bob.id);
}

#[test]
fn test_list_ready_missing_from_durable_tier() {
    let (_temp_dir, registry) = create_test_registry();

    let t1 = registry
        .create("ddddddddddd", Some("alice"), "d.mp3", TrackStatus::Ready, 100)
        .unwrap();
    let t2 = registry
        .create("eeeeeeeeeee", Some("alice"), "e.mp3", TrackStatus::Ready, 100)
        .unwrap();
    registry
        .create("fffffffffff", Some("alice"), "f.mp3", TrackStatus::Downloading, 0)
        .unwrap();

    let missing = registry.list_ready_missing_from_durable_tier(None).unwrap();
    assert_eq!(missing.len(), 2);

    registry.set_in_durable_tier(t1.id, true).unwrap();

    let missing = registry.list_ready_missing_from_durable_tier(None).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, t2.id);
}

#[test]
fn test_metadata_and_sharing() {
    let (_temp_dir, registry) = create_test_registry();

    let track = registry
        .create("ggggggggggg", Some("alice"), "g.mp3", TrackStatus::Downloading, 0)
        .unwrap();

    registry
        .update_metadata(track.id, "God's Plan", "Drake", Some("https://img/x.jpg"))
        .unwrap();
    registry.mark_shared(track.id, true).unwrap();

    let fetched = registry.get(track.id).unwrap();
    assert_eq!(fetched.title, "God's Plan");
    assert_eq!(fetched.artist, "Drake");
    assert_eq!(fetched.thumbnail_url.as_deref(), Some("https://img/x.jpg"));
    assert!(fetched.shared);
}

#[test]
fn test_count_by_locator() {
    let (_temp_dir, registry) = create_test_registry();

    registry
        .create("hhhhhhhhhhh", Some("alice"), "shared.mp3", TrackStatus::Ready, 100)
        .unwrap();
    let bob = registry
        .create("hhhhhhhhhhh", Some("bob"), "shared.mp3", TrackStatus::Ready, 100)
        .unwrap();

    assert_eq!(registry.count_by_locator("shared.mp3").unwrap(), 2);

    registry.delete(bob.id).unwrap();
    assert_eq!(registry.count_by_locator("shared.mp3").unwrap(), 1);
}

#[test]
fn test_list_for_owner_most_recent_first() {
    let (_temp_dir, registry) = create_test_registry();

    let first = registry
        .create("iiiiiiiiiii", Some("alice"), "i.mp3", TrackStatus::Ready, 100)
        .unwrap();
    let second = registry
        .create("jjjjjjjjjjj", Some("alice"), "j.mp3", TrackStatus::Downloading, 0)
        .unwrap();
    registry
        .create("iiiiiiiiiii", Some("bob"), "i.mp3", TrackStatus::Ready, 100)
        .unwrap();

    let tracks = registry.list_for_owner("alice").unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].id, second.id);
    assert_eq!(tracks[1].id, first.id);
}
