use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use common::Comment;
use dryrun::DryRunHost;
use publish::CommentPublisher;
use report::Document;

const AUTHORS: &[&str] = &["github-actions[bot]", "s0undt3ch", "someone", "dependabot[bot]"];
const BODIES: &[&str] = &[
    "# Binance - USDT - Apollo11",
    "## Binance",
    "### Kucoin - BUSD - Saturn5",
    "# Kraken",
    "Looks good to me",
    "#Binance",
];

proptest! {
    /// Pruning only ever removes earlier bot comments with a result header for
    /// a processed exchange; everything else survives.
    #[test]
    fn prune_only_removes_stale_bot_results(
        existing in prop::collection::vec((0..AUTHORS.len(), 0..BODIES.len()), 0..12),
        with_kucoin in any::<bool>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let comments: Vec<Comment> = existing
                .iter()
                .enumerate()
                .map(|(i, &(a, b))| Comment {
                    id: i as u64 + 1,
                    author: AUTHORS[a].to_string(),
                    body: BODIES[b].to_string(),
                    created_at: None,
                })
                .collect();
            let host = Arc::new(DryRunHost::with_comments("github-actions[bot]", comments.clone()));
            let publisher = CommentPublisher::new(
                host.clone(),
                vec!["github-actions[bot]".to_string(), "s0undt3ch".to_string()],
            );

            let mut exchanges: BTreeSet<String> = BTreeSet::from(["binance".to_string()]);
            if with_kucoin {
                exchanges.insert("kucoin".to_string());
            }
            let docs = vec![Document {
                exchange: "binance".into(),
                currency: "usdt".into(),
                strategy: "Apollo11".into(),
                body: "# Binance - USDT - Apollo11".into(),
            }];

            let summary = publisher.run(&docs, &exchanges).await.unwrap();
            let remaining = host.comments().await;

            // Freshly created comments always survive.
            for id in &summary.created {
                assert!(remaining.iter().any(|c| c.id == *id));
            }
            for original in &comments {
                let is_bot = original.author == "github-actions[bot]" || original.author == "s0undt3ch";
                let has_header = exchanges.iter().any(|e| {
                    let name = format!("{}{}", e[..1].to_uppercase(), &e[1..]);
                    ["#", "##", "###"]
                        .iter()
                        .any(|level| original.body.starts_with(&format!("{level} {name}")))
                });
                let survived = remaining.iter().any(|c| c.id == original.id);
                assert_eq!(survived, !(is_bot && has_header), "comment {:?}", original);
            }
        });
    }
}
