use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use common::{Comment, CommentHost, Error, Result};

const USER_AGENT: &str = "comment-ci-results";
const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;

/// REST API client for the comments of one GitHub commit.
pub struct GitHubClient {
    http: Client,
    /// API root, always ending in `/`.
    api_url: Url,
    /// `org/name`
    repo: String,
    sha: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str, repo: &str, sha: &str) -> Result<Self> {
        let api_url = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))
            .map_err(|e| Error::Config(format!("invalid API url '{api_url}': {e}")))?;

        let mut auth = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Config(format!("invalid token: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let http = Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            api_url,
            repo: repo.to_string(),
            sha: sha.to_string(),
        })
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid API path '{path}': {e}")))
    }

    fn commit_comments_path(&self) -> String {
        format!("repos/{}/commits/{}/comments", self.repo, self.sha)
    }

    /// Load the repository and the commit, failing if either is not reachable.
    pub async fn verify(&self) -> Result<()> {
        let body = self
            .send(self.http.get(self.url(&format!("repos/{}", self.repo))?))
            .await?;
        let repo: RepoResponse = parse(&body)?;
        info!(repo = %repo.full_name, "Loaded repository");

        let body = self
            .send(self.http.get(self.url(&format!("repos/{}/commits/{}", self.repo, self.sha))?))
            .await?;
        let commit: CommitResponse = parse(&body)?;
        info!(sha = %commit.sha, url = commit.html_url.as_deref().unwrap_or(""), "Loaded commit");
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let resp = request
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Remote(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl CommentHost for GitHubClient {
    async fn create_comment(&self, body: &str) -> Result<Comment> {
        let url = self.url(&self.commit_comments_path())?;
        debug!(repo = %self.repo, sha = %self.sha, "Creating commit comment");
        let text = self
            .send(self.http.post(url).json(&serde_json::json!({ "body": body })))
            .await?;
        let comment: CommentResponse = parse(&text)?;
        Ok(comment.into())
    }

    async fn list_comments(&self) -> Result<Vec<Comment>> {
        let mut comments = Vec::new();
        let mut page = 1usize;
        loop {
            let mut url = self.url(&self.commit_comments_path())?;
            url.query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());
            let text = self.send(self.http.get(url)).await?;
            let batch: Vec<CommentResponse> = parse(&text)?;
            let done = batch.len() < PAGE_SIZE;
            comments.extend(batch.into_iter().map(Comment::from));
            if done {
                break;
            }
            page += 1;
        }
        debug!(count = comments.len(), "Listed commit comments");
        Ok(comments)
    }

    async fn delete_comment(&self, id: u64) -> Result<()> {
        let url = self.url(&format!("repos/{}/comments/{id}", self.repo))?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::Remote(format!("unexpected response: {e}")))
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RepoResponse {
    full_name: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct CommentResponse {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    /// `null` for deleted accounts.
    #[serde(default)]
    user: Option<UserResponse>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

impl From<CommentResponse> for Comment {
    fn from(resp: CommentResponse) -> Self {
        Comment {
            id: resp.id,
            author: resp.user.map(|u| u.login).unwrap_or_default(),
            body: resp.body.unwrap_or_default(),
            created_at: resp.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> GitHubClient {
        GitHubClient::new(api_url, "token", "org/strategies", "abc123").unwrap()
    }

    #[test]
    fn comment_urls_are_built_under_api_root() {
        let c = client("https://api.github.com");
        let url = c.url(&c.commit_comments_path()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/org/strategies/commits/abc123/comments"
        );
    }

    #[test]
    fn enterprise_api_prefix_is_kept() {
        let c = client("https://git.example.com/api/v3/");
        let url = c.url("repos/org/strategies/comments/7").unwrap();
        assert_eq!(
            url.as_str(),
            "https://git.example.com/api/v3/repos/org/strategies/comments/7"
        );
    }

    #[test]
    fn invalid_api_url_is_config_error() {
        let err = GitHubClient::new("not a url", "t", "o/r", "s").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn comment_response_maps_author_and_body() {
        let resp: CommentResponse = serde_json::from_str(
            r###"{"id": 9, "body": "## Binance", "user": {"login": "github-actions[bot]"},
                "created_at": "2022-03-01T10:00:00Z", "commit_id": "abc123"}"###,
        )
        .unwrap();
        let comment = Comment::from(resp);
        assert_eq!(comment.id, 9);
        assert_eq!(comment.author, "github-actions[bot]");
        assert_eq!(comment.body, "## Binance");
        assert!(comment.created_at.is_some());
    }

    #[test]
    fn ghost_user_maps_to_empty_author() {
        let resp: CommentResponse =
            serde_json::from_str(r#"{"id": 1, "body": null, "user": null}"#).unwrap();
        let comment = Comment::from(resp);
        assert_eq!(comment.author, "");
        assert_eq!(comment.body, "");
    }
}
