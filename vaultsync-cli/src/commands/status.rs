//! `vaultsync status`: what each vault would do on its next sync.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use vaultsync_core::credentials::is_oauth_authorized;
use vaultsync_core::{AuthMode, SettingsStore, VaultId, VaultTree};
use vaultsync_sync::RepositoryAction;

use super::{display_path, App};

/// Arguments for `vaultsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let tree = app.tree()?;

        let rows = tree
            .iter()
            .map(|(id, _)| vault_status(&app, &tree, id))
            .collect::<Result<Vec<_>>>()?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&app, rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct VaultStatus {
    vault: String,
    key: String,
    path: String,
    repository: bool,
    origin: Option<String>,
    action: RepositoryAction,
    auth: &'static str,
    auto_pull: bool,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "vault")]
    vault: String,
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "next action")]
    action: String,
    #[tabled(rename = "origin")]
    origin: String,
    #[tabled(rename = "auth")]
    auth: String,
    #[tabled(rename = "auto-pull")]
    auto_pull: String,
}

fn vault_status(app: &App, tree: &VaultTree, id: VaultId) -> Result<VaultStatus> {
    let vault = tree.get(id).context("vault disappeared from the tree")?;
    let orchestrator = &app.orchestrator;

    let origin = orchestrator
        .resolve_origin(tree, id)
        .with_context(|| format!("failed to resolve origin for '{}'", vault.label))?;
    let repository = orchestrator.has_repository(tree, id)?;
    let settings = app
        .settings
        .load_settings(&vault.key)
        .with_context(|| format!("failed to load settings for '{}'", vault.label))?;

    let oauth = is_oauth_authorized(app.settings.as_ref(), app.secrets.as_ref(), &vault.key)?;
    let auth = match settings.auth_mode {
        Some(AuthMode::SshKey) if settings.has_ssh_key() => "ssh",
        _ if oauth => "oauth",
        _ if settings.has_ssh_key() => "ssh",
        _ => "none",
    };

    Ok(VaultStatus {
        vault: vault.label.clone(),
        key: vault.key.prefix(8).to_string(),
        path: display_path(&vault.path),
        repository,
        action: RepositoryAction::decide(repository, origin.is_some()),
        origin,
        auth,
        auto_pull: settings.auto_pull,
    })
}

fn print_table(app: &App, rows: Vec<VaultStatus>) {
    println!(
        "vaultsync v{} | {} vaults | storage: {:?}",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        app.config.storage_mode,
    );

    if rows.is_empty() {
        println!("No vaults registered.");
        return;
    }

    let needs_auth = rows
        .iter()
        .filter(|r| r.auth == "none" && r.origin.as_deref().is_some_and(is_https))
        .count();

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            action: action_label(row.action),
            origin: row.origin.unwrap_or_else(|| "-".to_string()),
            auth: row.auth.to_string(),
            auto_pull: if row.auto_pull { "on" } else { "off" }.to_string(),
            vault: row.vault,
            key: row.key,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if needs_auth > 0 {
        println!(
            "{} https origins need `vaultsync auth login <vault>` before syncing.",
            needs_auth.to_string().yellow().bold()
        );
    }
}

fn action_label(action: RepositoryAction) -> String {
    let label = action.label();
    match action {
        RepositoryAction::InitCommit => label.bright_black().to_string(),
        RepositoryAction::Commit => label.green().to_string(),
        RepositoryAction::ClonePush => label.yellow().to_string(),
        RepositoryAction::PullPush => label.cyan().to_string(),
    }
}

fn is_https(origin: &str) -> bool {
    origin.to_lowercase().starts_with("https://")
}
