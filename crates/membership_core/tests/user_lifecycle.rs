use membership_core::{
    CollectionKind, CollectionService, CoreConfig, ErrorKind, SqliteStore, UserDetail,
    UserProfile, UserService,
};

fn profile(email: &str, given: &str, family: &str) -> UserProfile {
    UserProfile {
        email: email.to_string(),
        family_name: family.to_string(),
        given_name: given.to_string(),
        detail: None,
    }
}

#[test]
fn create_and_get_user_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store.clone());

    let mut input = profile("ada@example.com", "Ada", "Lovelace");
    input.detail = Some(UserDetail {
        preferred_language: Some("en".to_string()),
        phone_number: None,
    });
    let id = users.create_user(input).unwrap();

    let user = users.get_user(&id).unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.given_name, "Ada");
    assert_eq!(user.family_name, "Lovelace");
    assert_eq!(
        user.detail.as_ref().and_then(|detail| detail.preferred_language.as_deref()),
        Some("en")
    );
    assert!(user.groups.is_empty());
    assert!(user.movies.is_empty());
    assert_eq!(store.row_count("demo", "users").unwrap(), 1);
}

#[test]
fn invalid_email_is_rejected() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store.clone());

    let err = users
        .create_user(profile("not-an-email", "No", "Body"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(store.row_count("demo", "users").unwrap(), 0);
}

#[test]
fn update_user_keeps_memberships() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store.clone());
    let groups = CollectionService::new(store.clone(), CollectionKind::Group);
    let id = users
        .create_user(profile("ada@example.com", "Ada", "Lovelace"))
        .unwrap();
    let g1 = groups.create_collection("Analysts", &id).unwrap();

    users
        .update_user(&id, profile("ada@engine.org", "Ada", "King"))
        .unwrap();

    let user = users.get_user(&id).unwrap();
    assert_eq!(user.email, "ada@engine.org");
    assert_eq!(user.family_name, "King");
    assert!(user.belongs_to(CollectionKind::Group, &g1));
}

#[test]
fn update_missing_user_reports_not_found() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store);

    let err = users
        .update_user("missing", profile("a@example.com", "A", "B"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn list_users_returns_every_user() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store);
    let mut ids = ["a@example.com", "b@example.com", "c@example.com"]
        .iter()
        .map(|email| users.create_user(UserProfile::with_email(*email)).unwrap())
        .collect::<Vec<_>>();

    let mut listed = users
        .list_users()
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect::<Vec<_>>();
    ids.sort();
    listed.sort();
    assert_eq!(listed, ids);
}

#[test]
fn delete_user_cascades_into_groups_and_movies() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store.clone());
    let groups = CollectionService::new(store.clone(), CollectionKind::Group);
    let movies = CollectionService::new(store.clone(), CollectionKind::Movie);
    let owner = users.create_user(UserProfile::with_email("o@example.com")).unwrap();
    let leaving = users.create_user(UserProfile::with_email("l@example.com")).unwrap();
    let g1 = groups.create_collection("Club", &owner).unwrap();
    let m1 = movies.create_collection("Brazil", &owner).unwrap();
    groups.add_member(&g1, &leaving, "member").unwrap();
    movies.add_member(&m1, &leaving, "viewer").unwrap();

    users.delete_user(&leaving).unwrap();

    assert_eq!(users.get_user(&leaving).unwrap_err().kind(), ErrorKind::NotFound);
    for members in [
        groups.list_members(&g1).unwrap(),
        movies.list_members(&m1).unwrap(),
    ] {
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, owner);
    }
}

#[test]
fn delete_missing_user_reports_not_found() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store);
    assert_eq!(
        users.delete_user("missing").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        db_path: Some(dir.path().join("membership.sqlite3")),
        ..CoreConfig::default()
    };

    let (user_id, group_id) = {
        let store = config.open_store().unwrap();
        let users = UserService::with_policy(store.clone(), config.retry_policy());
        let groups =
            CollectionService::with_policy(store, CollectionKind::Group, config.retry_policy());
        let user_id = users.create_user(UserProfile::with_email("p@example.com")).unwrap();
        let group_id = groups.create_collection("Durable", &user_id).unwrap();
        (user_id, group_id)
    };

    let store = config.open_store().unwrap();
    let users = UserService::new(store.clone());
    let groups = CollectionService::new(store, CollectionKind::Group);
    assert!(users
        .get_user(&user_id)
        .unwrap()
        .belongs_to(CollectionKind::Group, &group_id));
    assert_eq!(groups.get_collection(&group_id).unwrap().name, "Durable");
}

#[test]
fn surrounding_whitespace_is_trimmed_from_stored_email() {
    let store = SqliteStore::open_in_memory().unwrap();
    let users = UserService::new(store);

    let id = users
        .create_user(profile("  ada@example.com ", "Ada", "Lovelace"))
        .unwrap();
    assert_eq!(users.get_user(&id).unwrap().email, "ada@example.com");

    users
        .update_user(&id, profile("\tada@engine.org\n", "Ada", "King"))
        .unwrap();
    assert_eq!(users.get_user(&id).unwrap().email, "ada@engine.org");
}
