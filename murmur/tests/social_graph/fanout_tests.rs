use std::{sync::Arc, time::Duration};

use murmur::{Post, PostSummary, uploads::UploadSigner};

use super::support::*;

async fn create_posts<S: Store>(client: &Client<S>, owner: &UserId, count: usize) -> Vec<PostId> {
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        created.push(post_by(client, owner).await);
    }
    created
}

/// Creates 13 posts under a cap of 12, then deletes the oldest cached one: the cache is
/// topped back up with the 13th.
async fn post_cache_repairs_after_delete<S: Store>(client: &Client<S>) {
    let owner = register(client, "owner").await;
    assert_eq!(owner.posts_count, 0);

    let created = create_posts(client, &owner.id, 13).await;
    let user = client.user(&owner.id).await.expect("owner");
    assert_eq!(user.posts.len(), 12);
    assert_eq!(user.posts_count, 13);
    assert_eq!(user.posts[0].id, created[12]);
    assert!(user.posts.iter().all(|summary| summary.id != created[0]));

    let oldest_cached = user.posts[11].id.clone();
    assert_eq!(oldest_cached, created[1]);
    client.delete_post(&owner.id, &oldest_cached).await.expect("delete post");

    let user = client.user(&owner.id).await.expect("owner");
    assert_eq!(user.posts.len(), 12);
    assert_eq!(user.posts_count, 12);
    assert_eq!(user.posts[11].id, created[0]);
}

#[tokio::test]
async fn post_cache_is_capped_and_repaired() {
    let client = memory_client();
    post_cache_repairs_after_delete(&client).await;
}

#[tokio::test]
#[ignore = "requires a Redis server"]
#[serial]
async fn post_cache_is_capped_and_repaired_on_redis() {
    let client = redis_client().await;
    post_cache_repairs_after_delete(&client).await;
    cleanup(&client).await;
}

#[tokio::test]
async fn cache_length_is_min_of_count_and_cap() {
    let mut settings = Settings::default();
    settings.limits.posts_cache = 3;
    let client = memory_client_with(settings);
    let owner = register(&client, "owner").await;

    let mut created = create_posts(&client, &owner.id, 5).await;
    for index in [4, 0, 2, 1] {
        let post_id = created.remove(index.min(created.len() - 1));
        client.delete_post(&owner.id, &post_id).await.expect("delete");

        let user = client.user(&owner.id).await.expect("owner");
        assert_eq!(user.posts_count, created.len() as u64);
        assert_eq!(user.posts.len() as u64, user.posts_count.min(3));
    }

    let posts: Vec<Post> = client.store().documents().await.expect("posts");
    assert_eq!(posts.len(), 1);
}

fn assert_newest_first(posts: &[PostSummary]) {
    assert!(
        posts.windows(2).all(|pair| pair[0].created_at > pair[1].created_at),
        "not newest first: {:?}",
        posts.iter().map(|summary| summary.created_at).collect::<Vec<_>>()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_keep_the_cache_newest_first() {
    let mut settings = Settings::default();
    settings.limits.posts_cache = 3;
    let shared = shared_memory_client(settings);
    let client: &Client<MemoryStore> = &shared;
    let owner = register(client, "owner").await;

    for _ in 0..25 {
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let owner_id = owner.id.clone();
                tokio::spawn(async move { post_by(&shared, &owner_id).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("join create");
        }

        let user = client.user(&owner.id).await.expect("owner");
        assert_eq!(user.posts.len() as u64, user.posts_count.min(3));
        assert_newest_first(&user.posts);
    }

    let user = client.user(&owner.id).await.expect("owner");
    assert_eq!(user.posts_count, 100);
    let page = client.profile_posts(&owner.username, 0, 100).await.expect("every post");
    assert_eq!(page.items.len(), 100);
    assert_newest_first(&page.items);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_and_deletes_keep_the_cap() {
    let mut settings = Settings::default();
    settings.limits.posts_cache = 3;
    let shared = shared_memory_client(settings);
    let client: &Client<MemoryStore> = &shared;
    let owner = register(client, "owner").await;
    let mut live = create_posts(client, &owner.id, 6).await;

    for _ in 0..10 {
        let doomed: Vec<PostId> = live.drain(..2).collect();
        let mut creates = Vec::new();
        for _ in 0..3 {
            let shared = Arc::clone(&shared);
            let owner_id = owner.id.clone();
            creates.push(tokio::spawn(async move { post_by(&shared, &owner_id).await }));
        }
        let mut deletes = Vec::new();
        for post_id in doomed {
            let shared = Arc::clone(&shared);
            let owner_id = owner.id.clone();
            deletes.push(tokio::spawn(async move { shared.delete_post(&owner_id, &post_id).await }));
        }
        for task in creates {
            live.push(task.await.expect("join create"));
        }
        for task in deletes {
            task.await.expect("join delete").expect("delete post");
        }

        let user = client.user(&owner.id).await.expect("owner");
        assert_eq!(user.posts_count, live.len() as u64);
        assert_eq!(user.posts.len() as u64, user.posts_count.min(3));
        assert_newest_first(&user.posts);

        let page = client.profile_posts(&owner.username, 0, live.len()).await.expect("every post");
        assert_eq!(page.items.len(), live.len());
        assert_newest_first(&page.items);
        }

    let posts: Vec<Post> = client.store().documents().await.expect("posts");
    assert_eq!(posts.len(), live.len());
}

#[tokio::test]
async fn profile_posts_pages_past_the_cache() {
    let client = memory_client();
    let owner = register(&client, "owner").await;
    let created = create_posts(&client, &owner.id, 13).await;

    let first = client.profile_posts(&owner.username, 0, 12).await.expect("first page");
    assert_eq!(first.items.len(), 12);
    assert!(first.has_next_page);
    assert_eq!(first.items[0].id, created[12]);

    let second = client.profile_posts(&owner.username, 12, 12).await.expect("second page");
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, created[0]);
    assert!(!second.has_next_page);

    let straddling = client.profile_posts(&owner.username, 10, 2).await.expect("straddling page");
    let ids: Vec<PostId> = straddling.items.into_iter().map(|summary| summary.id).collect();
    assert_eq!(ids, vec![created[2].clone(), created[1].clone()]);
    assert!(straddling.has_next_page);

    let beyond = client.profile_posts(&owner.username, 40, 12).await.expect("beyond");
    assert!(beyond.items.is_empty());
    assert!(!beyond.has_next_page);
}

#[tokio::test]
async fn home_and_similar_posts_read_the_cache() {
    let client = memory_client();
    let owner = register(&client, "owner").await;
    let created = create_posts(&client, &owner.id, 11).await;

    let home = client.home_posts(&owner.id).await.expect("home");
    assert_eq!(home.len(), 11);

    let similar = client.similar_posts(&owner.username, &created[10]).await.expect("similar");
    assert_eq!(similar.len(), 9);
    assert!(similar.iter().all(|summary| summary.id != created[10]));
    assert_eq!(similar[0].id, created[9]);
}

#[tokio::test]
async fn created_posts_store_unsigned_image_references() {
    let client = memory_client();
    let owner = register(&client, "owner").await;

    let created = client
        .create_post(
            &owner.id,
            NewPost {
                caption: "  beach day ".to_string(),
                location: Some("   ".to_string()),
                image_count: 2,
            },
        )
        .await
        .expect("create post");

    let post = &created.post.post;
    assert_eq!(post.caption, "beach day");
    assert_eq!(post.location, None);
    assert_eq!(created.post.author.username, owner.username);
    assert_eq!(created.upload_urls.len(), 2);
    assert_eq!(post.images.len(), 2);
    for (index, (url, image)) in created.upload_urls.iter().zip(&post.images).enumerate() {
        assert!(url.contains("?expires="), "{url}");
        assert!(url.starts_with(image.as_str()));
        assert!(image.ends_with(&format!("{}/{index}", post.id)), "{image}");
    }

    let user = client.user(&owner.id).await.expect("owner");
    assert_eq!(user.posts[0].images, post.images);
}

struct CdnSigner;

impl UploadSigner for CdnSigner {
    fn presign_put(&self, key: &str, expires: Duration) -> Result<String, SocialError> {
        Ok(format!("https://cdn.example.com/{key}?ttl={}&sig=abc", expires.as_secs()))
    }
}

#[tokio::test]
async fn custom_signers_shape_image_references() {
    let client = memory_client().with_uploads(Arc::new(CdnSigner));
    let owner = register(&client, "owner").await;

    let created = client
        .create_post(
            &owner.id,
            NewPost {
                image_count: 1,
                ..NewPost::default()
            },
        )
        .await
        .expect("create post");

    let post = &created.post.post;
    assert_eq!(created.upload_urls, vec![format!("https://cdn.example.com/{}/0?ttl=600&sig=abc", post.id)]);
    assert_eq!(post.images, vec![format!("https://cdn.example.com/{}/0", post.id)]);
}

#[tokio::test]
async fn posts_need_an_image() {
    let client = memory_client();
    let owner = register(&client, "owner").await;

    let err = client
        .create_post(&owner.id, NewPost::default())
        .await
        .expect_err("no images");
    let validation = match err {
        SocialError::Validation(validation) => validation,
        other => panic!("expected a validation error, got {other:?}"),
    };
    assert_eq!(validation.issues[0].field, "image_count");
    assert_eq!(client.user(&owner.id).await.expect("owner").posts_count, 0);
}

#[tokio::test]
async fn posting_as_unknown_user_is_not_found() {
    let client = memory_client();
    let err = client
        .create_post(
            &UserId::from("ghost"),
            NewPost {
                image_count: 1,
                ..NewPost::default()
            },
        )
        .await
        .expect_err("unknown owner");
    assert!(matches!(err, SocialError::NotFound { kind: "user", .. }), "{err:?}");

    let posts: Vec<Post> = client.store().documents().await.expect("posts");
    assert!(posts.is_empty());
}
