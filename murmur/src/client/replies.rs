use log::info;

use crate::{
    client::{Client, authors, within},
    errors::SocialError,
    fanout::page_window,
    id::{CommentId, ReplyId, UserId, monotonic_now},
    keys::{Relation, index_score},
    store::{Session, Store, UnitOfWork},
    types::{AuthorSummary, Comment, NewReply, Page, Post, Reply, ReplyView, User},
    validators::validate_message,
};

struct CreateReply {
    reply: Reply,
}

impl UnitOfWork for CreateReply {
    type Output = ReplyView;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<ReplyView, SocialError> {
        let author = tx.require::<User>(&self.reply.user_id).await?;
        let mut post = tx.require::<Post>(&self.reply.post_id).await?;
        let mut comment = tx.require::<Comment>(&self.reply.reply_to_id).await?;
        if comment.post_id != post.id {
            return Err(SocialError::Mismatch {
                reply_to: comment.id.to_string(),
                post: post.id.to_string(),
            });
        }

        let reply = Reply {
            created_at: monotonic_now(),
            ..self.reply.clone()
        };
        let score = index_score(reply.created_at);
        tx.put(&reply)?;
        tx.relate(Relation::RepliesByComment(&comment.id), reply.id.as_str(), score);
        tx.relate(Relation::RepliesByPost(&post.id), reply.id.as_str(), score);

        comment.replies_count += 1;
        post.replies_count += 1;
        sync_embedded(&mut post, &comment);
        tx.put(&comment)?;
        tx.put(&post)?;

        Ok(ReplyView {
            reply,
            author: AuthorSummary::from(&author),
        })
    }
}

struct DeleteReply<'a> {
    actor: &'a UserId,
    reply_id: &'a ReplyId,
}

impl UnitOfWork for DeleteReply<'_> {
    type Output = ();

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<(), SocialError> {
        let reply = tx.require::<Reply>(self.reply_id).await?;
        if &reply.user_id != self.actor {
            return Err(SocialError::Forbidden {
                action: "delete another user's reply",
            });
        }

        tx.remove::<Reply>(&reply.id);
        tx.unrelate(Relation::RepliesByComment(&reply.reply_to_id), reply.id.as_str());
        tx.unrelate(Relation::RepliesByPost(&reply.post_id), reply.id.as_str());

        // Parents that are already gone are skipped.
        let comment = match tx.load::<Comment>(&reply.reply_to_id).await? {
            Some(mut comment) => {
                comment.replies_count = comment.replies_count.saturating_sub(1);
                tx.put(&comment)?;
                Some(comment)
            }
            None => None,
        };
        if let Some(mut post) = tx.load::<Post>(&reply.post_id).await? {
            post.replies_count = post.replies_count.saturating_sub(1);
            if let Some(comment) = &comment {
                sync_embedded(&mut post, comment);
            }
            tx.put(&post)?;
        }

        Ok(())
    }
}

/// Keeps the post's cached copy of `comment` in step with the comment document.
fn sync_embedded(post: &mut Post, comment: &Comment) {
    if let Some(cached) = post.comments.iter_mut().find(|cached| cached.id == comment.id) {
        cached.replies_count = comment.replies_count;
    }
}

impl<S: Store> Client<S> {
    /// Replies to a comment. The comment must belong to `input.post_id`.
    pub async fn create_reply(&self, actor: &UserId, input: NewReply) -> Result<ReplyView, SocialError> {
        let message = validate_message("message", &input.message)?;
        let reply = Reply {
            id: ReplyId::generate(),
            post_id: input.post_id,
            reply_to_id: input.reply_to_id,
            user_id: actor.clone(),
            message,
            likes_count: 0,
            created_at: monotonic_now(),
        };

        let view = self.write("create_reply", CreateReply { reply }).await?;
        info!("{actor} replied {} to comment {}", view.reply.id, view.reply.reply_to_id);
        Ok(view)
    }

    pub async fn delete_reply(&self, actor: &UserId, reply_id: &ReplyId) -> Result<(), SocialError> {
        self.write("delete_reply", DeleteReply { actor, reply_id }).await?;
        info!("{actor} deleted reply {reply_id}");
        Ok(())
    }

    /// Replies to `comment_id`, newest first, with their authors.
    pub async fn replies(&self, comment_id: &CommentId, skip: usize, limit: usize) -> Result<Page<ReplyView>, SocialError> {
        within("replies", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            let comment = tx.require::<Comment>(comment_id).await?;
            let window = page_window(0, comment.replies_count, skip, limit);
            if window.overflow_limit == 0 {
                return Ok(Page {
                    items: Vec::new(),
                    has_next_page: window.has_next_page,
                });
            }

            let entries = tx
                .relation_desc(
                    Relation::RepliesByComment(&comment.id),
                    window.overflow_offset,
                    Some(window.overflow_limit),
                )
                .await?;
            let mut replies = Vec::with_capacity(entries.len());
            for entry in entries {
                if let Some(reply) = tx.load::<Reply>(&ReplyId::from(entry.member)).await? {
                    replies.push(reply);
                }
            }

            let authors = authors(&mut tx, replies.iter().map(|reply| &reply.user_id)).await?;
            let items = replies
                .into_iter()
                .filter_map(|reply| {
                    let author = authors.get(&reply.user_id)?.clone();
                    Some(ReplyView { reply, author })
                })
                .collect();
            Ok(Page {
                items,
                has_next_page: window.has_next_page,
            })
        })
        .await
    }
}
