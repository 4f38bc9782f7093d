pub mod github;
pub mod publisher;

pub use github::GitHubClient;
pub use publisher::{CommentPublisher, PublishSummary};
