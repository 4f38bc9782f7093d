use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use common::{CommentHost, Config, Result};
use dryrun::DryRunHost;
use publish::{CommentPublisher, GitHubClient};
use report::{Manifest, Renderer, ResultTree};

/// Post backtest comparison tables as comments on the CI commit.
#[derive(Parser, Debug)]
#[command(name = "comment-ci-results")]
struct Cli {
    /// Repository the commit belongs to, as `org/name`
    #[arg(long)]
    repo: String,

    /// Artifacts directory holding `reports-info.json`
    path: PathBuf,

    /// Render and print the comments without calling the remote API
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_remote() {
                error!(error = %e, "Comment API call failed; earlier changes were kept");
            }
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(repo = %cli.repo, sha = %cfg.github_sha, path = %cli.path.display(), "Collecting CI results");

    // ── Results ───────────────────────────────────────────────────────────────
    let manifest = Manifest::load(&cli.path, &cfg.github_sha)?;
    let tree = ResultTree::load(&manifest)?;
    debug!(tree = ?tree, "Normalized results");

    let documents = Renderer::new(&tree, &cli.path, &cli.repo).render_all()?;
    let exchanges: BTreeSet<String> = tree.exchanges().map(String::from).collect();
    info!(documents = documents.len(), exchanges = exchanges.len(), "Rendered comments");

    // ── Comment host (remote unless dry-run) ─────────────────────────────────
    let host: Arc<dyn CommentHost> = if cli.dry_run {
        for doc in &documents {
            println!("{}\n", doc.body);
        }
        let author = cfg.bot_logins.first().cloned().unwrap_or_default();
        Arc::new(DryRunHost::new(author))
    } else {
        let client = GitHubClient::new(&cfg.github_api_url, &cfg.github_token, &cli.repo, &cfg.github_sha)?;
        client.verify().await?;
        Arc::new(client)
    };

    // ── Publish, then prune ──────────────────────────────────────────────────
    let publisher = CommentPublisher::new(host, cfg.bot_logins.clone());
    let summary = publisher.run(&documents, &exchanges).await?;
    info!(
        created = summary.created.len(),
        deleted = summary.deleted.len(),
        "Commit comments updated"
    );
    Ok(())
}
