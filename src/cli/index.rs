use anyhow::{bail, Result};

use notegate::config::NotegateConfig;
use notegate::search::{CliSearch, SearchBackend};

/// Run the search indexer over the vault with the long index timeout.
pub async fn index(config: &NotegateConfig) -> Result<()> {
    let search = CliSearch::from_config(&config.search);
    let Some(exe) = search.executable().cloned() else {
        bail!(notegate::error::SearchError::Unavailable);
    };
    if !search.is_available().await {
        bail!("search executable not found at {}", exe.display());
    }

    println!("Indexing {} with {}...", config.resolved_vault_root().display(), exe.display());
    search.index().await?;
    println!("Index up to date.");
    Ok(())
}
