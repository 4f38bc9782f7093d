pub mod manifest;
pub mod metrics;
pub mod render;
pub mod tree;

pub use manifest::{Manifest, ReportManifestEntry, CURRENT, MANIFEST_FILE, PREVIOUS};
pub use metrics::{classify, ordered_keys, MetricRow, Polarity, Trend};
pub use render::{Document, Renderer};
pub use tree::{Report, ResultTree};
