//! `vaultsync vault add <path>` and `vaultsync vault list`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use vaultsync_core::settings::register_vault_at;
use vaultsync_core::{VaultId, VaultTree};

use super::{display_path, home_dir, App};

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Register a folder of notes as a vault.
    Add(AddArgs),

    /// List registered vaults, nested vaults under their parent.
    List,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Vault root folder.
    pub path: PathBuf,

    /// Display name; defaults to the folder name.
    #[arg(long, short = 'l')]
    pub label: Option<String>,

    /// Parent vault (label or settings key prefix) for a nested vault.
    #[arg(long, short = 'p')]
    pub parent: Option<String>,
}

pub fn run(cmd: VaultCommand) -> Result<()> {
    match cmd {
        VaultCommand::Add(args) => add(args),
        VaultCommand::List => list(),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let home = home_dir()?;
    let path = args
        .path
        .canonicalize()
        .with_context(|| format!("vault folder {} does not exist", args.path.display()))?;

    let parent = match args.parent.as_deref() {
        Some(query) => {
            let app = App::load()?;
            let (tree, id) = app.vault(query)?;
            tree.get(id).map(|v| v.key.clone())
        }
        None => None,
    };

    let record = register_vault_at(&home, path, args.label, parent)
        .context("failed to register vault")?;
    println!(
        "✓ Registered '{}' ({}) at {}",
        record.label,
        record.key.prefix(8),
        display_path(&record.path)
    );
    Ok(())
}

fn list() -> Result<()> {
    let app = App::load()?;
    let tree = app.tree()?;
    if tree.is_empty() {
        println!("No vaults registered.");
        println!("Run: vaultsync vault add <path>");
        return Ok(());
    }

    for (id, vault) in tree.iter() {
        if vault.parent.is_none() {
            print_vault(&tree, id, 0);
        }
    }
    Ok(())
}

fn print_vault(tree: &VaultTree, id: VaultId, depth: usize) {
    let Some(vault) = tree.get(id) else {
        return;
    };
    println!(
        "{}{} [{}] {}",
        "  ".repeat(depth),
        vault.label,
        vault.key.prefix(8),
        display_path(&vault.path)
    );
    for child in &vault.children {
        print_vault(tree, *child, depth + 1);
    }
}
