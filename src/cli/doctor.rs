//! CLI `doctor` command: print a configuration and collaborator report.

use anyhow::Result;

use notegate::config::{default_config_path, NotegateConfig};
use notegate::search::{CliSearch, SearchBackend};
use notegate::store::{FsNoteStore, NoteStore};

pub async fn doctor(config: &NotegateConfig) -> Result<()> {
    let config_path = default_config_path();
    let root = config.resolved_vault_root();

    println!("Notegate Health Report");
    println!("======================");
    println!();
    println!(
        "Config file:       {}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (not found, using defaults)" }
    );
    println!("Listen address:    127.0.0.1:{}", config.server.port);
    println!(
        "Rate limit:        {} requests / {}s",
        config.server.rate_limit_requests, config.server.rate_limit_window_secs
    );
    println!();

    println!("Vault:");
    println!("  Name:            {}", config.store_name());
    println!("  Root:            {}", root.display());
    match FsNoteStore::open(&root) {
        Ok(store) => match store.list_markdown_files().await {
            Ok(files) => println!("  Notes:           {}", files.len()),
            Err(e) => println!("  Notes:           unreadable ({e})"),
        },
        Err(e) => println!("  Status:          UNUSABLE ({e})"),
    }
    println!("  Extensions:      {}", config.vault.allowed_extensions.join(", "));
    println!("  Task note:       {}", config.vault.task_note);
    println!();

    println!("Approval:");
    if config.approval.require_approval {
        println!("  Required:        yes ({}s timeout)", config.approval.timeout_secs);
    } else {
        println!("  Required:        NO (mutating tools run without consent)");
    }
    println!("  Consent surface: {}", config.approval.consent);
    println!();

    println!(
        "Audit log:         {} (capacity {})",
        if config.audit.enabled { "enabled" } else { "disabled" },
        config.audit.capacity
    );
    println!();

    let search = CliSearch::from_config(&config.search);
    println!("Search:");
    match search.executable() {
        None => {
            println!("  Executable:      (not configured)");
            println!("  Set search.executable or NOTEGATE_SEARCH_BIN, then run `notegate index`.");
        }
        Some(exe) => {
            let status = if search.is_available().await { "OK" } else { "NOT FOUND" };
            println!("  Executable:      {} ({status})", exe.display());
        }
    }

    Ok(())
}
