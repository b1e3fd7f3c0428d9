pub(crate) use murmur::{
    Client, CommentId, GraphChange, MemoryStore, NewComment, NewPost, NewReply, NewUser, PostId, RedisStore,
    Settings, SocialError, Store, User, UserDetails, UserId, id::generate_entity_id,
};
pub(crate) use serial_test::serial;
pub(crate) use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) static TEST_NAMESPACE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A key prefix no other test uses.
pub(crate) fn unique_prefix() -> String {
    let idx = TEST_NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("murmur_test_{}_{}", idx, generate_entity_id())
}

pub(crate) fn memory_client() -> Client<MemoryStore> {
    memory_client_with(Settings::default())
}

pub(crate) fn memory_client_with(settings: Settings) -> Client<MemoryStore> {
    Client::new(MemoryStore::new(unique_prefix()), settings).expect("build client")
}

/// A client for spawned tasks, with enough commit attempts to outlast heavy contention.
pub(crate) fn shared_memory_client(settings: Settings) -> std::sync::Arc<Client<MemoryStore>> {
    let store = MemoryStore::new(unique_prefix()).with_max_commit_attempts(64);
    std::sync::Arc::new(Client::new(store, settings).expect("build client"))
}

pub(crate) async fn redis_client() -> Client<RedisStore> {
    let mut settings = Settings::default();
    settings.store.redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    settings.store.prefix = unique_prefix();
    Client::connect(settings).await.expect("connect to redis")
}

pub(crate) async fn cleanup(client: &Client<RedisStore>) {
    client.store().cleanup().await.expect("cleanup redis keys");
}

pub(crate) async fn register<S: Store>(client: &Client<S>, handle: &str) -> User {
    client
        .register_user(NewUser {
            email: format!("{handle}@example.com"),
            username: format!("{handle}_user"),
            name: "Test User".to_string(),
            password_hash: "$argon2id$v=19$hash".to_string(),
        })
        .await
        .expect("register user")
}

pub(crate) async fn post_by<S: Store>(client: &Client<S>, owner: &UserId) -> PostId {
    client
        .create_post(
            owner,
            NewPost {
                caption: "sunset".to_string(),
                location: None,
                image_count: 1,
            },
        )
        .await
        .expect("create post")
        .post
        .post
        .id
}

pub(crate) async fn comment_on<S: Store>(client: &Client<S>, author: &UserId, post_id: &PostId) -> CommentId {
    client
        .create_comment(
            author,
            NewComment {
                post_id: post_id.clone(),
                message: "nice".to_string(),
            },
        )
        .await
        .expect("create comment")
        .comment
        .id
}

pub(crate) async fn reply_to<S: Store>(
    client: &Client<S>,
    author: &UserId,
    post_id: &PostId,
    comment_id: &CommentId,
) -> murmur::ReplyId {
    client
        .create_reply(
            author,
            NewReply {
                post_id: post_id.clone(),
                reply_to_id: comment_id.clone(),
                message: "thanks".to_string(),
            },
        )
        .await
        .expect("create reply")
        .reply
        .id
}
