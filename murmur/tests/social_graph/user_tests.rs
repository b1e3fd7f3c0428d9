use std::time::Duration;

use murmur::{
    runtime::CommitPlan,
    store::{IndexEntry, StoreError, Versioned},
};

use super::support::*;

#[tokio::test]
async fn registration_normalizes_and_indexes_users() {
    let client = memory_client();
    let user = client
        .register_user(NewUser {
            email: " Carol@Example.COM ".to_string(),
            username: "carol.k".to_string(),
            name: " Carol King ".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .expect("register");

    assert_eq!(user.email, "carol@example.com");
    assert_eq!(user.name, "Carol King");
    assert_eq!(user.posts_count, 0);
    assert!(user.posts.is_empty());

    assert_eq!(client.user_by_username("carol.k").await.expect("by username").id, user.id);
    assert_eq!(client.user_by_email("CAROL@example.com").await.expect("by email").id, user.id);
    assert!(matches!(
        client.user_by_username("nobody_here").await,
        Err(SocialError::NotFound { kind: "user", .. })
    ));
}

#[tokio::test]
async fn duplicate_email_or_username_is_rejected() {
    let client = memory_client();
    register(&client, "alice").await;

    let err = client
        .register_user(NewUser {
            email: "ALICE@example.com".to_string(),
            username: "someone_else".to_string(),
            name: "Alice".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .expect_err("duplicate email");
    assert!(
        matches!(err, SocialError::DuplicateKey { ref fields, .. } if fields == &["email"]),
        "{err:?}"
    );

    let err = client
        .register_user(NewUser {
            email: "other@example.com".to_string(),
            username: "alice_user".to_string(),
            name: "Alice".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .expect_err("duplicate username");
    assert!(
        matches!(err, SocialError::DuplicateKey { ref fields, .. } if fields == &["username"]),
        "{err:?}"
    );

    let users: Vec<User> = client.store().documents().await.expect("users");
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn invalid_registration_reports_every_field() {
    let client = memory_client();
    let err = client
        .register_user(NewUser {
            email: "not-an-email".to_string(),
            username: ".x".to_string(),
            name: "9lives".to_string(),
            password_hash: String::new(),
        })
        .await
        .expect_err("invalid input");

    let validation = match err {
        SocialError::Validation(validation) => validation,
        other => panic!("expected a validation error, got {other:?}"),
    };
    let fields: Vec<&str> = validation.issues.iter().map(|issue| issue.field.as_str()).collect();
    assert_eq!(fields, vec!["email", "username", "name", "password_hash"]);
}

/// Delegates to a [`MemoryStore`] but holds every commit back for `delay`.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl Store for SlowStore {
    fn prefix(&self) -> &str {
        self.inner.prefix()
    }

    fn max_commit_attempts(&self) -> u32 {
        self.inner.max_commit_attempts()
    }

    async fn get(&self, key: &str) -> Result<Versioned<Option<String>>, StoreError> {
        self.inner.get(key).await
    }

    async fn range_desc(
        &self,
        index: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Versioned<Vec<IndexEntry>>, StoreError> {
        self.inner.range_desc(index, offset, limit).await
    }

    async fn score(&self, index: &str, member: &str) -> Result<Versioned<Option<i64>>, StoreError> {
        self.inner.score(index, member).await
    }

    async fn cardinality(&self, index: &str) -> Result<Versioned<u64>, StoreError> {
        self.inner.cardinality(index).await
    }

    async fn commit(&self, plan: &CommitPlan) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.commit(plan).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn expired_write_deadline_leaves_no_state() {
    let mut settings = Settings::default();
    settings.timeouts.write_ms = 20;
    let store = SlowStore {
        inner: MemoryStore::new(unique_prefix()),
        delay: Duration::from_millis(500),
    };
    let client = Client::new(store, settings).expect("build client");

    let err = client
        .register_user(NewUser {
            email: "late@example.com".to_string(),
            username: "late_user".to_string(),
            name: "Late".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .expect_err("deadline");
    assert!(matches!(err, SocialError::Timeout { operation: "register_user" }), "{err:?}");
    assert!(err.is_retryable());

    let users: Vec<User> = client.store().inner.documents().await.expect("users");
    assert!(users.is_empty());
    assert!(matches!(
        client.user_by_email("late@example.com").await,
        Err(SocialError::NotFound { .. })
    ));
}
