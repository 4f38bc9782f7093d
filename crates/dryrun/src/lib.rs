use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Comment, CommentHost, Error, Result};

/// In-memory comment host for dry runs.
///
/// Comments are kept in a local list. Nothing is ever sent to a remote service.
pub struct DryRunHost {
    /// Login recorded as the author of created comments.
    author: String,
    comments: Arc<RwLock<Vec<Comment>>>,
    next_id: AtomicU64,
}

impl DryRunHost {
    pub fn new(author: impl Into<String>) -> Self {
        let author = author.into();
        info!(author = %author, "DryRunHost initialized");
        Self {
            author,
            comments: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start with pre-existing comments on the commit.
    pub fn with_comments(author: impl Into<String>, existing: Vec<Comment>) -> Self {
        let next = existing.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self {
            author: author.into(),
            comments: Arc::new(RwLock::new(existing)),
            next_id: AtomicU64::new(next),
        }
    }

    /// Snapshot of the comments currently on the commit.
    pub async fn comments(&self) -> Vec<Comment> {
        self.comments.read().await.clone()
    }
}

#[async_trait]
impl CommentHost for DryRunHost {
    async fn create_comment(&self, body: &str) -> Result<Comment> {
        let comment = Comment {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            author: self.author.clone(),
            body: body.to_string(),
            created_at: Some(Utc::now()),
        };
        debug!(id = comment.id, bytes = body.len(), "Dry-run comment stored");
        self.comments.write().await.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self) -> Result<Vec<Comment>> {
        Ok(self.comments.read().await.clone())
    }

    async fn delete_comment(&self, id: u64) -> Result<()> {
        let mut comments = self.comments.write().await;
        let idx = comments
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::Remote(format!("HTTP 404 Not Found: no comment {id}")))?;
        comments.remove(idx);
        debug!(id, "Dry-run comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: u64, author: &str, body: &str) -> Comment {
        Comment {
            id,
            author: author.into(),
            body: body.into(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn created_comments_are_listed() {
        let host = DryRunHost::new("github-actions[bot]");
        let created = host.create_comment("# Binance - USDT - Apollo11").await.unwrap();

        let listed = host.list_comments().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], created);
        assert_eq!(listed[0].author, "github-actions[bot]");
    }

    #[tokio::test]
    async fn ids_continue_after_existing_comments() {
        let host = DryRunHost::with_comments("bot", vec![comment(41, "someone", "hi")]);
        let created = host.create_comment("body").await.unwrap();
        assert_eq!(created.id, 42);
    }

    #[tokio::test]
    async fn delete_removes_comment() {
        let host = DryRunHost::with_comments("bot", vec![comment(1, "bot", "a"), comment(2, "bot", "b")]);
        host.delete_comment(1).await.unwrap();
        let ids: Vec<u64> = host.comments().await.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn deleting_unknown_comment_is_a_remote_error() {
        let host = DryRunHost::new("bot");
        let err = host.delete_comment(7).await.unwrap_err();
        assert!(err.is_remote());
    }
}
