use std::sync::Arc;

use murmur::{Comment, Post, Reply};

use super::support::*;

async fn delete_post_removes_comments_and_replies<S: Store>(client: &Client<S>) {
    let owner = register(client, "owner").await;
    let reader = register(client, "reader").await;
    let kept = post_by(client, &owner.id).await;
    let doomed = post_by(client, &owner.id).await;

    let first = comment_on(client, &reader.id, &doomed).await;
    let _second = comment_on(client, &owner.id, &doomed).await;
    let reply = reply_to(client, &owner.id, &doomed, &first).await;
    let survivor = comment_on(client, &reader.id, &kept).await;

    let report = client.delete_post(&owner.id, &doomed).await.expect("delete post");
    assert_eq!(report.comments_removed, 2);
    assert_eq!(report.replies_removed, 1);

    let owner_after = client.user(&owner.id).await.expect("owner");
    assert_eq!(owner_after.posts_count, 1);
    assert!(owner_after.posts.iter().all(|summary| summary.id != doomed));

    assert!(matches!(
        client.post(&doomed).await,
        Err(SocialError::NotFound { kind: "post", .. })
    ));
    assert!(matches!(
        client.replies(&first, 0, 12).await,
        Err(SocialError::NotFound { kind: "comment", .. })
    ));
    assert!(matches!(
        client.delete_reply(&owner.id, &reply).await,
        Err(SocialError::NotFound { kind: "reply", .. })
    ));

    let remaining = client.comments(&kept, 0, 12).await.expect("comments of kept post");
    assert_eq!(remaining.items.len(), 1);
    assert_eq!(remaining.items[0].comment.id, survivor);
}

#[tokio::test]
async fn delete_post_cascades() {
    let client = memory_client();
    delete_post_removes_comments_and_replies(&client).await;

    let comments: Vec<Comment> = client.store().documents().await.expect("comments");
    let replies: Vec<Reply> = client.store().documents().await.expect("replies");
    let posts: Vec<Post> = client.store().documents().await.expect("posts");
    assert_eq!(posts.len(), 1);
    assert!(comments.iter().all(|comment| comment.post_id == posts[0].id));
    assert!(replies.is_empty());
}

#[tokio::test]
#[ignore = "requires a Redis server"]
#[serial]
async fn delete_post_cascades_on_redis() {
    let client = redis_client().await;
    delete_post_removes_comments_and_replies(&client).await;
    cleanup(&client).await;
}

#[tokio::test]
async fn only_the_owner_may_delete_a_post() {
    let client = memory_client();
    let owner = register(&client, "owner").await;
    let intruder = register(&client, "intruder").await;
    let post_id = post_by(&client, &owner.id).await;
    comment_on(&client, &intruder.id, &post_id).await;

    let err = client.delete_post(&intruder.id, &post_id).await.expect_err("forbidden");
    assert!(matches!(err, SocialError::Forbidden { .. }), "{err:?}");

    let post = client.post(&post_id).await.expect("post survives");
    assert_eq!(post.post.comments_count, 1);
    assert_eq!(client.user(&owner.id).await.expect("owner").posts_count, 1);
}

#[tokio::test]
async fn delete_comment_cascades_to_replies() {
    let client = memory_client();
    let owner = register(&client, "owner").await;
    let reader = register(&client, "reader").await;
    let post_id = post_by(&client, &owner.id).await;

    let kept = comment_on(&client, &owner.id, &post_id).await;
    let doomed = comment_on(&client, &reader.id, &post_id).await;
    reply_to(&client, &owner.id, &post_id, &doomed).await;
    reply_to(&client, &reader.id, &post_id, &doomed).await;
    reply_to(&client, &reader.id, &post_id, &kept).await;

    let err = client.delete_comment(&owner.id, &doomed).await.expect_err("not the author");
    assert!(matches!(err, SocialError::Forbidden { .. }), "{err:?}");

    let report = client.delete_comment(&reader.id, &doomed).await.expect("delete comment");
    assert_eq!(report.comments_removed, 1);
    assert_eq!(report.replies_removed, 2);

    let post = client.post(&post_id).await.expect("post").post;
    assert_eq!(post.comments_count, 1);
    assert_eq!(post.replies_count, 1);
    assert_eq!(post.comments.len(), 1);
    assert_eq!(post.comments[0].id, kept);

    let replies: Vec<Reply> = client.store().documents().await.expect("replies");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].reply_to_id, kept);
}

#[tokio::test]
async fn comments_count_tracks_comment_documents() {
    let client = memory_client();
    let owner = register(&client, "owner").await;
    let reader = register(&client, "reader").await;
    let post_id = post_by(&client, &owner.id).await;

    let mut written = Vec::new();
    for _ in 0..4 {
        written.push(comment_on(&client, &reader.id, &post_id).await);
    }
    client.delete_comment(&reader.id, &written[1]).await.expect("delete");
    client.delete_comment(&reader.id, &written[3]).await.expect("delete");
    comment_on(&client, &owner.id, &post_id).await;

    let posts: Vec<Post> = client.store().documents().await.expect("posts");
    let comments: Vec<Comment> = client.store().documents().await.expect("comments");
    for post in posts {
        let actual = comments.iter().filter(|comment| comment.post_id == post.id).count() as u64;
        assert_eq!(post.comments_count, actual);
        assert_eq!(post.comments.len() as u64, actual);
    }
}

#[tokio::test]
async fn embedded_comments_refill_after_delete() {
    let mut settings = Settings::default();
    settings.limits.comments_cache = 2;
    let client = memory_client_with(settings);
    let owner = register(&client, "owner").await;
    let post_id = post_by(&client, &owner.id).await;

    let oldest = comment_on(&client, &owner.id, &post_id).await;
    let middle = comment_on(&client, &owner.id, &post_id).await;
    let newest = comment_on(&client, &owner.id, &post_id).await;

    let post = client.post(&post_id).await.expect("post").post;
    let cached: Vec<CommentId> = post.comments.iter().map(|comment| comment.id.clone()).collect();
    assert_eq!(cached, vec![newest.clone(), middle.clone()]);

    client.delete_comment(&owner.id, &newest).await.expect("delete newest");

    let post = client.post(&post_id).await.expect("post").post;
    let cached: Vec<CommentId> = post.comments.iter().map(|comment| comment.id.clone()).collect();
    assert_eq!(cached, vec![middle, oldest]);
    assert_eq!(post.comments_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_post_racing_comments_leaves_no_orphans() {
    let shared = shared_memory_client(Settings::default());
    let client: &Client<MemoryStore> = &shared;
    let owner = register(client, "owner").await;
    let reader = register(client, "reader").await;

    for _ in 0..10 {
        let kept = post_by(client, &owner.id).await;
        let doomed = post_by(client, &owner.id).await;
        let first = comment_on(client, &reader.id, &doomed).await;

        let mut writers = Vec::new();
        for post_id in [&kept, &doomed, &kept, &doomed] {
            let shared = Arc::clone(&shared);
            let author = reader.id.clone();
            let post_id = post_id.clone();
            writers.push(tokio::spawn(async move {
                let input = NewComment {
                    post_id,
                    message: "racing".to_string(),
                };
                shared.create_comment(&author, input).await.map(|_| ())
            }));
        }
        for _ in 0..2 {
            let shared = Arc::clone(&shared);
            let author = owner.id.clone();
            let input = NewReply {
                post_id: doomed.clone(),
                reply_to_id: first.clone(),
                message: "racing".to_string(),
            };
            writers.push(tokio::spawn(async move { shared.create_reply(&author, input).await.map(|_| ()) }));
        }
        let deleter = {
            let shared = Arc::clone(&shared);
            let owner_id = owner.id.clone();
            let post_id = doomed.clone();
            tokio::spawn(async move { shared.delete_post(&owner_id, &post_id).await })
        };

        for writer in writers {
            match writer.await.expect("join writer") {
                Ok(()) | Err(SocialError::NotFound { .. }) => {}
                Err(err) => panic!("unexpected write failure: {err:?}"),
            }
        }
        deleter.await.expect("join delete").expect("delete post");
    }

    let posts: Vec<Post> = client.store().documents().await.expect("posts");
    let comments: Vec<Comment> = client.store().documents().await.expect("comments");
    let replies: Vec<Reply> = client.store().documents().await.expect("replies");
    assert_eq!(posts.len(), 10);
    for post in &posts {
        let count = comments.iter().filter(|comment| comment.post_id == post.id).count() as u64;
        assert_eq!(count, 2);
        assert_eq!(post.comments_count, count);
        assert_eq!(post.comments.len() as u64, count);
    }
    assert!(comments.iter().all(|comment| posts.iter().any(|post| post.id == comment.post_id)));
    assert!(replies.is_empty());

    let owner_after = client.user(&owner.id).await.expect("owner");
    assert_eq!(owner_after.posts_count, 10);
}
