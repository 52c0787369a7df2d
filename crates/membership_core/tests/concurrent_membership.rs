use membership_core::{
    CollectionKind, CollectionService, RetryPolicy, SqliteStore, UserProfile, UserService,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const WORKERS: usize = 6;

#[test]
fn concurrent_adds_to_one_group_all_land() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store.clone());
    let owner = users
        .create_user(UserProfile::with_email("owner@example.com"))
        .unwrap();
    let joiners = (0..WORKERS)
        .map(|n| {
            users
                .create_user(UserProfile::with_email(format!("j{n}@example.com")))
                .unwrap()
        })
        .collect::<Vec<_>>();

    // Each failed attempt of one worker implies a successful commit by
    // another, so WORKERS attempts always suffice.
    let policy = RetryPolicy::default()
        .with_max_attempts(WORKERS as u32)
        .with_backoff(Duration::from_millis(2));
    let groups = Arc::new(CollectionService::with_policy(
        store.clone(),
        CollectionKind::Group,
        policy,
    ));
    let group = groups.create_collection("Crowd", &owner).unwrap();

    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles = joiners
        .iter()
        .cloned()
        .map(|user_id| {
            let groups = Arc::clone(&groups);
            let barrier = Arc::clone(&barrier);
            let group = group.clone();
            thread::spawn(move || {
                barrier.wait();
                groups.add_member(&group, &user_id, "member")
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let members = groups.list_members(&group).unwrap();
    assert_eq!(members.len(), WORKERS + 1);
    let member_ids = members
        .iter()
        .map(|member| member.user_id.clone())
        .collect::<HashSet<_>>();
    assert_eq!(member_ids.len(), WORKERS + 1);
    for user_id in &joiners {
        assert!(member_ids.contains(user_id));
        let user = users.get_user(user_id).unwrap();
        assert_eq!(user.groups.len(), 1);
        assert_eq!(user.groups[0].collection_id, group);
    }
}

#[test]
fn concurrent_duplicate_adds_admit_exactly_one() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store.clone());
    let owner = users
        .create_user(UserProfile::with_email("owner@example.com"))
        .unwrap();
    let joiner = users
        .create_user(UserProfile::with_email("joiner@example.com"))
        .unwrap();
    let policy = RetryPolicy::default()
        .with_max_attempts(WORKERS as u32)
        .with_backoff(Duration::from_millis(2));
    let groups = Arc::new(CollectionService::with_policy(
        store,
        CollectionKind::Group,
        policy,
    ));
    let group = groups.create_collection("Solo", &owner).unwrap();

    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles = (0..WORKERS)
        .map(|_| {
            let groups = Arc::clone(&groups);
            let barrier = Arc::clone(&barrier);
            let group = group.clone();
            let joiner = joiner.clone();
            thread::spawn(move || {
                barrier.wait();
                groups.add_member(&group, &joiner, "member")
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| err.kind() == membership_core::ErrorKind::AlreadyBelongs));

    assert_eq!(groups.list_members(&group).unwrap().len(), 2);
    assert_eq!(users.get_user(&joiner).unwrap().groups.len(), 1);
}
