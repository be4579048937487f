//! Unit tests for flotilla-registry

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use flotilla_types::Rev;
use test_case::test_case;

use crate::codec::{Codec, JsonCodec, ListCodec, StringCodec};
use crate::file::{get_file, Dir, File};
use crate::memory::MemoryBackend;
use crate::snapshot::{Snapshot, Snapshotable};
use crate::{Conn, RegistryBackend, RegistryError};

fn backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

fn dial(backend: &Arc<MemoryBackend>) -> Snapshot {
    let conn: Conn = backend.clone();
    Snapshot::dial(conn).unwrap()
}

fn set(backend: &MemoryBackend, path: &str, rev: Rev, body: &str) -> Rev {
    backend
        .set(path, rev, Bytes::copy_from_slice(body.as_bytes()))
        .unwrap()
}

// ============================================================================
// Memory Backend
// ============================================================================

#[test]
fn set_get_round_trip() {
    let store = backend();
    let rev = set(&store, "apps/cat/attrs", Rev::ZERO, "meow");

    let (body, got_rev) = store.get("apps/cat/attrs", None).unwrap();
    assert_eq!(&body[..], b"meow");
    assert_eq!(got_rev, rev);
}

#[test]
fn revisions_are_strictly_increasing() {
    let store = backend();
    let r1 = set(&store, "a", Rev::ZERO, "1");
    let r2 = set(&store, "b", r1, "2");
    let r3 = set(&store, "c", r2, "3");

    assert!(r1 < r2 && r2 < r3);
    assert_eq!(store.rev().unwrap(), r3);
}

#[test_case("/apps/cat/attrs" ; "leading slash")]
#[test_case("apps/cat/attrs/" ; "trailing slash")]
#[test_case("apps/cat/attrs" ; "bare")]
fn paths_are_normalized(path: &str) {
    let store = backend();
    set(&store, path, Rev::ZERO, "meow");

    let (body, _) = store.get("apps/cat/attrs", None).unwrap();
    assert_eq!(&body[..], b"meow");
}

#[test]
fn cas_rejects_stale_writer() {
    let store = backend();
    set(&store, "apps/cat/attrs", Rev::ZERO, "first");

    let err = store
        .set("apps/cat/attrs", Rev::ZERO, Bytes::from_static(b"second"))
        .unwrap_err();
    assert!(err.is_rev_mismatch(), "expected rev mismatch, got {err}");
}

#[test]
fn reads_are_answered_as_of_a_revision() {
    let store = backend();
    let r1 = set(&store, "x", Rev::ZERO, "one");
    let r2 = set(&store, "x", r1, "two");

    let (old, _) = store.get("x", Some(r1)).unwrap();
    let (new, _) = store.get("x", Some(r2)).unwrap();
    assert_eq!(&old[..], b"one");
    assert_eq!(&new[..], b"two");
}

#[test]
fn get_missing_is_not_found() {
    let store = backend();
    let err = store.get("nope", None).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn exists_sees_leaves_and_directories() {
    let store = backend();
    set(&store, "apps/cat/attrs", Rev::ZERO, "{}");

    assert!(store.exists("apps/cat/attrs", None).unwrap().0);
    assert!(store.exists("apps/cat", None).unwrap().0);
    assert!(store.exists("apps", None).unwrap().0);
    assert!(!store.exists("apps/dog", None).unwrap().0);
}

#[test]
fn getdir_lists_immediate_children() {
    let store = backend();
    let r1 = set(&store, "apps/cat/attrs", Rev::ZERO, "{}");
    set(&store, "apps/dog/attrs", r1, "{}");

    let names = store.getdir("apps", Rev::HEAD).unwrap();
    assert_eq!(names, vec!["cat".to_owned(), "dog".to_owned()]);

    let err = store.getdir("services", Rev::HEAD).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn getdir_at_old_revision_hides_later_children() {
    let store = backend();
    let r1 = set(&store, "apps/cat/attrs", Rev::ZERO, "{}");
    set(&store, "apps/dog/attrs", r1, "{}");

    let names = store.getdir("apps", r1).unwrap();
    assert_eq!(names, vec!["cat".to_owned()]);
}

#[test]
fn del_removes_a_whole_subtree() {
    let store = backend();
    let r1 = set(&store, "tickets/5/op", Rev::ZERO, "a b c start");
    let r2 = set(&store, "tickets/5/status", r1, "unclaimed");

    store.del("tickets/5", r2).unwrap();

    assert!(!store.exists("tickets/5", None).unwrap().0);
    assert!(store.get("tickets/5/op", None).unwrap_err().is_not_found());
}

#[test]
fn del_is_cas_guarded() {
    let store = backend();
    let r1 = set(&store, "tickets/5/status", Rev::ZERO, "unclaimed");
    set(&store, "tickets/5/status", r1, "claimed");

    let err = store.del("tickets/5", r1).unwrap_err();
    assert!(err.is_rev_mismatch());
}

#[test]
fn del_missing_is_not_found() {
    let store = backend();
    assert!(store.del("ghost", Rev::HEAD).unwrap_err().is_not_found());
}

// ============================================================================
// Watch
// ============================================================================

#[test]
fn wait_delivers_matching_events() {
    let store = backend();
    let waiter = {
        let store = store.clone();
        thread::spawn(move || store.wait("tickets/*/status", Rev::ZERO))
    };

    let rev = set(&store, "tickets/7/status", Rev::HEAD, "unclaimed");

    let event = waiter.join().unwrap().unwrap();
    assert_eq!(event.path, "tickets/7/status");
    assert_eq!(event.rev, rev);
    assert_eq!(&event.body[..], b"unclaimed");
    assert!(event.is_set());
}

#[test]
fn wait_skips_paths_outside_the_glob() {
    let store = backend();
    let r1 = set(&store, "tickets/7/op", Rev::ZERO, "a b c start");
    set(&store, "tickets/7/status", r1, "unclaimed");

    let event = store.wait("tickets/*/status", Rev::ZERO).unwrap();
    assert_eq!(event.path, "tickets/7/status");
}

#[test]
fn wait_observes_deletions() {
    let store = backend();
    let r1 = set(&store, "tickets/7/status", Rev::ZERO, "unclaimed");
    store.del("tickets/7/status", r1).unwrap();

    let event = store.wait("tickets/*/status", r1).unwrap();
    assert!(event.is_del());
    assert!(event.rev > r1);
}

#[test]
fn wait_resumes_strictly_after_the_given_revision() {
    let store = backend();
    let r1 = set(&store, "tickets/7/status", Rev::ZERO, "unclaimed");

    // Nothing after r1 yet, so a fresh event has to wake the waiter.
    let waiter = {
        let store = store.clone();
        thread::spawn(move || store.wait("tickets/*/status", r1))
    };
    let r2 = set(&store, "tickets/9/status", Rev::HEAD, "unclaimed");

    let event = waiter.join().unwrap().unwrap();
    assert_eq!(event.rev, r2);
}

#[test]
fn glob_star_stays_within_one_segment() {
    let store = backend();
    let r1 = set(&store, "tickets/7/claims/h1", Rev::ZERO, "h1");
    set(&store, "tickets/9", r1, "leaf");

    let event = store.wait("tickets/*", Rev::ZERO).unwrap();
    assert_eq!(event.path, "tickets/9");
}

#[test]
fn close_unblocks_waiters() {
    let store = backend();
    let waiter = {
        let store = store.clone();
        thread::spawn(move || store.wait("never/*", Rev::ZERO))
    };

    store.close();

    let err = waiter.join().unwrap().unwrap_err();
    assert!(matches!(err, RegistryError::Closed));
}

// ============================================================================
// Codecs
// ============================================================================

#[test]
fn string_codec_round_trip() {
    let body = StringCodec.encode(&"hello".to_owned()).unwrap();
    assert_eq!(StringCodec.decode(&body).unwrap(), "hello");
}

#[test]
fn string_codec_rejects_invalid_utf8() {
    let err = StringCodec.decode(&[0xff, 0xfe]).unwrap_err();
    assert!(matches!(err, RegistryError::BadValue { .. }));
}

#[test]
fn list_codec_joins_with_single_spaces() {
    let list = vec![
        "lol".to_owned(),
        "cat".to_owned(),
        "app".to_owned(),
        "start".to_owned(),
    ];
    let body = ListCodec.encode(&list).unwrap();
    assert_eq!(&body[..], b"lol cat app start");
    assert_eq!(ListCodec.decode(&body).unwrap(), list);
}

#[test]
fn list_codec_decodes_empty_body_to_empty_list() {
    assert_eq!(ListCodec.decode(b"").unwrap(), Vec::<String>::new());
}

#[test]
fn list_codec_rejects_elements_containing_the_separator() {
    let err = ListCodec.encode(&vec!["two words".to_owned()]).unwrap_err();
    assert!(matches!(err, RegistryError::BadValue { .. }));
}

#[test]
fn json_codec_round_trip() {
    let value = serde_json::json!({
        "repo-url": "git://cat.git",
        "stack": "my-stack",
        "deploy-type": "lxc",
    });
    let body = JsonCodec.encode(&value).unwrap();
    assert_eq!(JsonCodec.decode(&body).unwrap(), value);
}

// ============================================================================
// Snapshot, File, Dir
// ============================================================================

#[test]
fn dial_pins_the_head_revision() {
    let store = backend();
    let r1 = set(&store, "x", Rev::ZERO, "1");

    let s = dial(&store);
    assert_eq!(s.rev(), r1);
}

#[test]
fn fast_forward_head_queries_the_store() {
    let store = backend();
    let s = dial(&store);
    let r1 = set(&store, "x", Rev::ZERO, "1");

    let forwarded = s.fast_forward(Rev::HEAD).unwrap();
    assert_eq!(forwarded.rev(), r1);
    // The original snapshot is untouched.
    assert_eq!(s.rev(), Rev::ZERO);
}

#[test]
fn snapshot_reads_ignore_later_writes() {
    let store = backend();
    set(&store, "apps/cat/attrs", Rev::ZERO, "{}");
    let s = dial(&store);
    set(&store, "apps/dog/attrs", Rev::HEAD, "{}");

    assert!(!s.exists("apps/dog").unwrap());
    assert_eq!(s.getdir("apps").unwrap(), vec!["cat".to_owned()]);
}

#[test]
fn file_create_then_get() {
    let store = backend();
    let s = dial(&store);
    let attrs = serde_json::json!({"stack": "my-stack"});

    let file = File::new(s.clone(), "apps/cat/attrs", attrs.clone(), JsonCodec)
        .create()
        .unwrap();
    assert!(file.rev() > s.rev());

    let read = get_file(file.snapshot(), "apps/cat/attrs", JsonCodec).unwrap();
    assert_eq!(read.value(), &attrs);
}

#[test]
fn stale_file_update_fails_cas() {
    let store = backend();
    let s = dial(&store);
    let file = File::new(s.clone(), "x", "one".to_owned(), StringCodec)
        .create()
        .unwrap();
    file.update("two".to_owned()).unwrap();

    let stale = File::new(s, "x", "three".to_owned(), StringCodec);
    let err = stale.create().unwrap_err();
    assert!(err.is_rev_mismatch());
}

#[test]
fn file_del_removes_the_leaf() {
    let store = backend();
    let s = dial(&store);
    let file = File::new(s, "x", "one".to_owned(), StringCodec)
        .create()
        .unwrap();
    let snapshot = file.snapshot().clone();

    file.del().unwrap();

    let head = snapshot.fast_forward(Rev::HEAD).unwrap();
    assert!(get_file(&head, "x", StringCodec).unwrap_err().is_not_found());
}

#[test]
fn snapshot_new_pins_the_given_revision() {
    let store = backend();
    let r1 = set(&store, "x", Rev::ZERO, "one");
    set(&store, "x", r1, "two");

    let conn: Conn = store.clone();
    let s = Snapshot::new(conn, r1);
    let file = get_file(&s, "x", StringCodec).unwrap();
    assert_eq!(file.value(), "one");
}

#[test]
fn dir_string_helpers() {
    let store = backend();
    let s = dial(&store);
    let dir = Dir::new(s, "apps/cat");

    let rev = dir.set("env/PORT", "8080").unwrap();
    let dir = dir.fast_forward(rev).unwrap();

    assert_eq!(dir.get_string("env/PORT").unwrap(), "8080");
    assert_eq!(dir.getdir("env").unwrap(), vec!["PORT".to_owned()]);
    assert!(dir.exists("/").unwrap());

    dir.del("/").unwrap();
    let dir = dir.fast_forward(Rev::HEAD).unwrap();
    assert!(!dir.exists("/").unwrap());
}

#[test]
fn dir_fast_forward_preserves_identity() {
    let store = backend();
    let s = dial(&store);
    let dir = Dir::new(s, "services/db");
    let rev = set(&store, "services/db/registered", Rev::ZERO, "now");

    let forwarded = dir.fast_forward(rev).unwrap();
    assert_eq!(forwarded.name(), "services/db");
    assert_eq!(forwarded.snapshot().rev(), rev);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

use proptest::prelude::*;

proptest! {
    /// Property: separator-free lists survive the list codec round trip.
    #[test]
    fn prop_list_codec_round_trip(list in proptest::collection::vec("[a-z0-9._:-]{1,12}", 0..8)) {
        let body = ListCodec.encode(&list).unwrap();
        prop_assert_eq!(ListCodec.decode(&body).unwrap(), list);
    }

    /// Property: every successful write returns a strictly greater revision.
    #[test]
    fn prop_writes_advance_the_head(ops in proptest::collection::vec((0usize..4, "[a-z]{1,4}"), 1..32)) {
        let store = MemoryBackend::new();
        let mut last = Rev::ZERO;
        for (slot, body) in ops {
            let path = format!("slot/{slot}");
            if let Ok(rev) = store.set(&path, Rev::HEAD, Bytes::from(body)) {
                prop_assert!(rev > last);
                last = rev;
            }
        }
        prop_assert_eq!(store.rev().unwrap(), last);
    }
}
