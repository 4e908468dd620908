//! Model-backed commands: free-text `search` and per-image `analyze`.

use super::{print_json, Session};

/// Execute the search command.
pub async fn execute(session: &Session, query: &str) -> anyhow::Result<()> {
    let mut library = session.library()?;
    let result = library.ai_search(session.principal(), query).await?;
    tracing::info!(
        "Resolved tags {:?}; {} matching images",
        result.tags,
        result.items.len()
    );
    print_json(&result)
}

/// Execute the analyze command.
pub async fn analyze(session: &Session, id: i64) -> anyhow::Result<()> {
    let mut library = session.library()?;
    let view = library.analyze(session.principal(), id).await?;
    tracing::info!("Image {} tagged {:?}", id, view.tags);
    print_json(&view)
}

pub fn ai_tags(session: &Session, id: i64) -> anyhow::Result<()> {
    let mut library = session.library()?;
    print_json(&library.ai_tags(session.principal(), id)?)
}
