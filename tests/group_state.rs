// tests/group_state.rs
//! Group aggregate behavior over stored history: deterministic replay,
//! membership flows, join requests, and cache invalidation.

mod common;
use common::{record, TestRelay};

use coterie::config::Config;
use coterie::groups::{ActionRegistry, Groups};
use coterie::proto::tags::{TAG_CLOSED, TAG_GROUP, TAG_MEMBER, TAG_NAME};
use coterie::proto::{kind, Filter, Tag};
use coterie::store::RecordStore;

async fn roster(groups: &Groups, id: &str) -> Vec<(String, Vec<String>)> {
    let handle = groups.load(id).await.unwrap().expect("group known");
    let group = handle.lock();
    group
        .members()
        .map(|(key, role)| {
            let permissions = role
                .permissions()
                .map(|permission| permission.as_str().to_string())
                .collect();
            (key.to_string(), permissions)
        })
        .collect()
}

#[tokio::test]
async fn add_then_remove_leaves_the_member_absent() {
    let relay = TestRelay::new();
    let add = record(
        "a1",
        "grp",
        kind::ADD_USER,
        vec![Tag::pair(TAG_GROUP, "grp"), Tag::pair(TAG_MEMBER, "x")],
    );
    relay.write.submit(add).await.unwrap();
    let remove = record(
        "a2",
        "grp",
        kind::REMOVE_USER,
        vec![Tag::pair(TAG_GROUP, "grp"), Tag::pair(TAG_MEMBER, "x")],
    );
    relay.write.submit(remove).await.unwrap();

    let handle = relay.groups.load("grp").await.unwrap().expect("group known");
    assert!(!handle.lock().is_member("x"));
}

#[tokio::test]
async fn replay_is_deterministic_across_loaders() {
    let relay = TestRelay::new();
    relay.write.create_group("grp", "owner").await.unwrap();
    for (id, member) in [("a1", "carol"), ("a2", "dave")] {
        let add = record(
            id,
            "owner",
            kind::ADD_USER,
            vec![Tag::pair(TAG_GROUP, "grp"), Tag::pair(TAG_MEMBER, member)],
        );
        relay.write.submit(add).await.unwrap();
    }

    let first = roster(&relay.groups, "grp").await;

    // A cold loader over the same store must land on the same state.
    let fresh = Groups::new(
        relay.store.clone(),
        ActionRegistry::standard(),
        relay.operator.clone(),
        &Config::default(),
    );
    let second = roster(&fresh, "grp").await;
    assert_eq!(first, second);
    assert!(first.iter().any(|(key, _)| key == "carol"));
}

#[tokio::test]
async fn join_requests_to_open_groups_are_auto_approved() {
    let relay = TestRelay::new();
    let join = record(
        "j1",
        "newcomer",
        kind::JOIN_REQUEST,
        vec![Tag::pair(TAG_GROUP, "grp")],
    );
    relay.write.submit(join).await.unwrap();

    let handle = relay.groups.load("grp").await.unwrap().expect("group known");
    assert!(handle.lock().is_member("newcomer"));

    let approvals = relay
        .store
        .count(Filter::new().kinds([kind::ADD_USER]))
        .await
        .unwrap();
    assert_eq!(approvals, 1);
}

#[tokio::test]
async fn join_requests_to_closed_groups_change_nothing() {
    let relay = TestRelay::new();
    let close = record(
        "c1",
        "grp",
        kind::EDIT_GROUP_STATUS,
        vec![Tag::pair(TAG_GROUP, "grp"), Tag::marker(TAG_CLOSED)],
    );
    relay.write.submit(close).await.unwrap();

    let join = record(
        "j1",
        "newcomer",
        kind::JOIN_REQUEST,
        vec![Tag::pair(TAG_GROUP, "grp")],
    );
    relay.write.submit(join).await.unwrap();

    let handle = relay.groups.load("grp").await.unwrap().expect("group known");
    assert!(!handle.lock().is_member("newcomer"));
    let approvals = relay
        .store
        .count(Filter::new().kinds([kind::ADD_USER]))
        .await
        .unwrap();
    assert_eq!(approvals, 0);
}

#[tokio::test]
async fn auto_approval_can_be_disabled() {
    let mut config = Config::default();
    config.policy.auto_approve_joins = false;
    let relay = TestRelay::with_config(config);
    let join = record(
        "j1",
        "newcomer",
        kind::JOIN_REQUEST,
        vec![Tag::pair(TAG_GROUP, "grp")],
    );
    relay.write.submit(join).await.unwrap();

    let handle = relay.groups.load("grp").await.unwrap().expect("group known");
    assert!(!handle.lock().is_member("newcomer"));
}

#[tokio::test]
async fn invalidation_forces_a_replay_from_the_store() {
    let relay = TestRelay::new();
    relay.write.create_group("grp", "owner").await.unwrap();

    // Written behind the cache's back, as a peer relay sync would.
    let edit = record(
        "e1",
        "grp",
        kind::EDIT_METADATA,
        vec![Tag::pair(TAG_GROUP, "grp"), Tag::pair(TAG_NAME, "Pictures")],
    );
    relay.store.put(edit).await.unwrap();

    let handle = relay.groups.load("grp").await.unwrap().expect("group known");
    assert_eq!(handle.lock().name, "");

    relay.groups.invalidate("grp");
    let handle = relay.groups.load("grp").await.unwrap().expect("group known");
    assert_eq!(handle.lock().name, "Pictures");
}

#[tokio::test]
async fn legacy_markers_make_historyless_groups_known() {
    let relay = TestRelay::new();
    assert!(relay.groups.load("grp").await.unwrap().is_none());

    let marker = record("m1", "grp", kind::GROUP_MARKER, vec![]);
    relay.store.put(marker).await.unwrap();
    assert!(relay.groups.load("grp").await.unwrap().is_some());
}
