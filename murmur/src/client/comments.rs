use log::info;

use crate::{
    client::{Client, authors, within},
    errors::SocialError,
    fanout::{paginate, pull_capped, push_capped, refill_candidate},
    id::{CommentId, PostId, ReplyId, UserId, monotonic_now},
    keys::{Relation, index_score},
    store::{Session, Store, UnitOfWork},
    types::{AuthorSummary, CascadeReport, Comment, CommentView, NewComment, Page, Post, Reply, User},
    validators::validate_message,
};

struct CreateComment {
    comment: Comment,
    cap: usize,
}

impl UnitOfWork for CreateComment {
    type Output = CommentView;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<CommentView, SocialError> {
        let author = tx.require::<User>(&self.comment.user_id).await?;
        let mut post = tx.require::<Post>(&self.comment.post_id).await?;

        let comment = Comment {
            created_at: monotonic_now(),
            ..self.comment.clone()
        };
        tx.put(&comment)?;
        tx.relate(
            Relation::CommentsByPost(&post.id),
            comment.id.as_str(),
            index_score(comment.created_at),
        );
        push_capped(&mut post.comments, &mut post.comments_count, comment.clone(), self.cap);
        tx.put(&post)?;

        Ok(CommentView {
            comment,
            author: AuthorSummary::from(&author),
        })
    }
}

struct DeleteComment<'a> {
    actor: &'a UserId,
    comment_id: &'a CommentId,
    cap: usize,
}

impl UnitOfWork for DeleteComment<'_> {
    type Output = CascadeReport;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<CascadeReport, SocialError> {
        let comment = tx.require::<Comment>(self.comment_id).await?;
        if &comment.user_id != self.actor {
            return Err(SocialError::Forbidden {
                action: "delete another user's comment",
            });
        }
        let mut post = tx.require::<Post>(&comment.post_id).await?;

        let replies = tx
            .relation_desc(Relation::RepliesByComment(&comment.id), 0, None)
            .await?;
        for entry in &replies {
            tx.remove::<Reply>(&ReplyId::from(entry.member.as_str()));
            tx.unrelate(Relation::RepliesByPost(&post.id), &entry.member);
        }
        tx.drop_relation(Relation::RepliesByComment(&comment.id));

        tx.remove::<Comment>(&comment.id);
        tx.unrelate(Relation::CommentsByPost(&post.id), comment.id.as_str());

        pull_capped(&mut post.comments, &mut post.comments_count, comment.id.as_str());
        post.replies_count = post.replies_count.saturating_sub(replies.len() as u64);
        let candidate = refill_candidate(
            tx,
            Relation::CommentsByPost(&post.id),
            &post.comments,
            post.comments_count,
            self.cap,
        )
        .await?;
        if let Some(member) = candidate {
            if let Some(refill) = tx.load::<Comment>(&CommentId::from(member)).await? {
                post.comments.push(refill);
            }
        }
        tx.put(&post)?;

        Ok(CascadeReport {
            comments_removed: 1,
            replies_removed: replies.len(),
        })
    }
}

impl<S: Store> Client<S> {
    pub async fn create_comment(&self, actor: &UserId, input: NewComment) -> Result<CommentView, SocialError> {
        let message = validate_message("message", &input.message)?;
        let comment = Comment {
            id: CommentId::generate(),
            post_id: input.post_id,
            user_id: actor.clone(),
            message,
            likes_count: 0,
            replies_count: 0,
            created_at: monotonic_now(),
        };

        let view = self
            .write(
                "create_comment",
                CreateComment {
                    comment,
                    cap: self.settings.limits.comments_cache,
                },
            )
            .await?;
        info!("{actor} commented {} on post {}", view.comment.id, view.comment.post_id);
        Ok(view)
    }

    /// Deletes a comment written by `actor` together with its replies.
    pub async fn delete_comment(&self, actor: &UserId, comment_id: &CommentId) -> Result<CascadeReport, SocialError> {
        let report = self
            .write(
                "delete_comment",
                DeleteComment {
                    actor,
                    comment_id,
                    cap: self.settings.limits.comments_cache,
                },
            )
            .await?;
        info!(
            "{actor} deleted comment {comment_id} ({} replies)",
            report.replies_removed
        );
        Ok(report)
    }

    /// Comments on `post_id`, newest first, with their authors. Comments whose author no
    /// longer exists are left out.
    pub async fn comments(&self, post_id: &PostId, skip: usize, limit: usize) -> Result<Page<CommentView>, SocialError> {
        within("comments", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            let post = tx.require::<Post>(post_id).await?;
            let paged = paginate(
                &mut tx,
                Relation::CommentsByPost(&post.id),
                &post.comments,
                post.comments_count,
                skip,
                limit,
            )
            .await?;

            let mut comments = paged.cached;
            for member in paged.overflow {
                if let Some(comment) = tx.load::<Comment>(&CommentId::from(member)).await? {
                    comments.push(comment);
                }
            }

            let authors = authors(&mut tx, comments.iter().map(|comment| &comment.user_id)).await?;
            let items = comments
                .into_iter()
                .filter_map(|comment| {
                    let author = authors.get(&comment.user_id)?.clone();
                    Some(CommentView { comment, author })
                })
                .collect();
            Ok(Page {
                items,
                has_next_page: paged.has_next_page,
            })
        })
        .await
    }
}
