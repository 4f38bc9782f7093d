use async_trait::async_trait;

use crate::{Comment, Result};

/// Abstraction over the service hosting commit comments.
///
/// `GitHubClient` implements this against the REST API.
/// `DryRunHost` implements this in memory for dry runs and tests.
///
/// An implementation is bound to a single commit: every call operates on the
/// comments of that commit.
#[async_trait]
pub trait CommentHost: Send + Sync {
    /// Create a comment on the commit and return it as stored by the host.
    async fn create_comment(&self, body: &str) -> Result<Comment>;

    /// List every comment currently attached to the commit.
    async fn list_comments(&self) -> Result<Vec<Comment>>;

    /// Delete a comment by id.
    async fn delete_comment(&self, id: u64) -> Result<()>;
}
