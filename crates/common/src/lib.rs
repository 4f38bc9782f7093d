pub mod comments;
pub mod config;
pub mod error;
pub mod types;

pub use comments::CommentHost;
pub use config::{Config, EngineConfig};
pub use error::{Error, Result};
pub use types::*;
