use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::info;

use common::{Comment, CommentHost, Result};
use report::render::capitalize;
use report::Document;

/// What a publishing run did on the commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub created: Vec<u64>,
    pub deleted: Vec<u64>,
}

/// Publishes rendered documents as commit comments and removes the ones they
/// supersede.
///
/// Calls are issued one at a time: every creation first, then a single prune
/// pass. The first failing call aborts the run; nothing already created or
/// deleted is rolled back.
pub struct CommentPublisher {
    host: Arc<dyn CommentHost>,
    /// Identities whose comments may be pruned.
    bot_logins: Vec<String>,
}

impl CommentPublisher {
    pub fn new(host: Arc<dyn CommentHost>, bot_logins: Vec<String>) -> Self {
        Self { host, bot_logins }
    }

    pub async fn run(
        &self,
        documents: &[Document],
        exchanges: &BTreeSet<String>,
    ) -> Result<PublishSummary> {
        let created = self.publish(documents).await?;
        let created_ids: HashSet<u64> = created.iter().copied().collect();
        let deleted = self.prune(&created_ids, exchanges).await?;
        Ok(PublishSummary { created, deleted })
    }

    /// Create one comment per document, in order. Returns the new comment ids.
    pub async fn publish(&self, documents: &[Document]) -> Result<Vec<u64>> {
        let mut created = Vec::with_capacity(documents.len());
        for doc in documents {
            let comment = self.host.create_comment(&doc.body).await?;
            info!(
                id = comment.id,
                exchange = %doc.exchange,
                currency = %doc.currency,
                strategy = %doc.strategy,
                "Created comment"
            );
            created.push(comment.id);
        }
        Ok(created)
    }

    /// Delete earlier result comments for the processed exchanges.
    pub async fn prune(
        &self,
        created: &HashSet<u64>,
        exchanges: &BTreeSet<String>,
    ) -> Result<Vec<u64>> {
        let prefixes = header_prefixes(exchanges);
        let mut deleted = Vec::new();
        for comment in self.host.list_comments().await? {
            if !is_stale(&comment, created, &prefixes, &self.bot_logins) {
                continue;
            }
            info!(
                id = comment.id,
                author = %comment.author,
                created_at = ?comment.created_at,
                "Deleting previous comment"
            );
            self.host.delete_comment(comment.id).await?;
            deleted.push(comment.id);
        }
        Ok(deleted)
    }
}

/// `# Exchange`, `## Exchange` and `### Exchange` for every exchange.
pub fn header_prefixes(exchanges: &BTreeSet<String>) -> Vec<String> {
    let mut prefixes = Vec::with_capacity(exchanges.len() * 3);
    for level in ["#", "##", "###"] {
        for exchange in exchanges {
            prefixes.push(format!("{level} {}", capitalize(exchange)));
        }
    }
    prefixes
}

/// A comment is stale when a recognised bot wrote it, it was not created in
/// this run, and it starts with one of the result headers.
pub fn is_stale(
    comment: &Comment,
    created: &HashSet<u64>,
    prefixes: &[String],
    bot_logins: &[String],
) -> bool {
    bot_logins.iter().any(|login| *login == comment.author)
        && !created.contains(&comment.id)
        && prefixes.iter().any(|p| comment.body.starts_with(p.as_str()))
}
