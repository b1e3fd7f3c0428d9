use super::support::*;

#[tokio::test]
async fn save_post_is_idempotent() {
    let client = memory_client();
    let owner = register(&client, "owner").await;
    let reader = register(&client, "reader").await;
    let post_id = post_by(&client, &owner.id).await;

    assert_eq!(client.save_post(&reader.id, &post_id).await.expect("save"), GraphChange::Applied);
    assert_eq!(
        client.save_post(&reader.id, &post_id).await.expect("save again"),
        GraphChange::Unchanged
    );

    let saved = client.saved_posts(&reader.id, 0, 12).await.expect("saved");
    assert_eq!(saved.items.len(), 1);
    assert_eq!(saved.items[0].id, post_id);

    assert_eq!(client.unsave_post(&reader.id, &post_id).await.expect("unsave"), GraphChange::Applied);
    assert_eq!(
        client.unsave_post(&reader.id, &post_id).await.expect("unsave again"),
        GraphChange::Unchanged
    );
    assert!(client.saved_posts(&reader.id, 0, 12).await.expect("saved").items.is_empty());
}

#[tokio::test]
async fn saved_posts_page_past_the_cache() {
    let mut settings = Settings::default();
    settings.limits.saved_posts_cache = 2;
    let client = memory_client_with(settings);
    let owner = register(&client, "owner").await;
    let reader = register(&client, "reader").await;

    let mut posts = Vec::new();
    for _ in 0..3 {
        let post_id = post_by(&client, &owner.id).await;
        client.save_post(&reader.id, &post_id).await.expect("save");
        posts.push(post_id);
    }

    let page = client.saved_posts(&reader.id, 0, 3).await.expect("saved");
    let ids: Vec<PostId> = page.items.into_iter().map(|summary| summary.id).collect();
    assert_eq!(ids, vec![posts[2].clone(), posts[1].clone(), posts[0].clone()]);
    assert!(!page.has_next_page);

    client.unsave_post(&reader.id, &posts[2]).await.expect("unsave");
    let page = client.saved_posts(&reader.id, 0, 2).await.expect("saved");
    let ids: Vec<PostId> = page.items.into_iter().map(|summary| summary.id).collect();
    assert_eq!(ids, vec![posts[1].clone(), posts[0].clone()]);
}

#[tokio::test]
async fn deleted_posts_drop_out_of_saved_posts() {
    let client = memory_client();
    let owner = register(&client, "owner").await;
    let reader = register(&client, "reader").await;
    let kept = post_by(&client, &owner.id).await;
    let doomed = post_by(&client, &owner.id).await;
    client.save_post(&reader.id, &kept).await.expect("save");
    client.save_post(&reader.id, &doomed).await.expect("save");

    client.delete_post(&owner.id, &doomed).await.expect("delete");

    let saved = client.saved_posts(&reader.id, 0, 12).await.expect("saved");
    assert_eq!(saved.items.len(), 1);
    assert_eq!(saved.items[0].id, kept);

    assert_eq!(
        client.unsave_post(&reader.id, &doomed).await.expect("unsave deleted"),
        GraphChange::Applied
    );
}

#[tokio::test]
async fn saving_a_missing_post_is_not_found() {
    let client = memory_client();
    let reader = register(&client, "reader").await;

    let err = client
        .save_post(&reader.id, &PostId::from("missing"))
        .await
        .expect_err("missing post");
    assert!(matches!(err, SocialError::NotFound { kind: "post", .. }), "{err:?}");
}
