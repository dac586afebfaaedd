//! vaultsync: per-vault git synchronization.
//!
//! # Usage
//!
//! ```text
//! vaultsync vault add <path> [--label L] [--parent VAULT]
//! vaultsync vault list
//! vaultsync status [--json]
//! vaultsync sync <vault> [--message M]
//! vaultsync remove <vault>
//! vaultsync origin <vault> [<url> | --clear]
//! vaultsync auto-pull <vault> on|off
//! vaultsync ssh-key <vault> --private FILE [--public FILE] [--passphrase P]
//! vaultsync auth login|logout <vault>
//! vaultsync diagnose <vault>
//! vaultsync watch
//! ```
//!
//! `<vault>` is a vault label or a prefix of its settings key.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    auth::AuthCommand, auto_pull::AutoPullArgs, diagnose::DiagnoseArgs, origin::OriginArgs,
    remove::RemoveArgs, ssh_key::SshKeyArgs, status::StatusArgs, sync::SyncArgs,
    vault::VaultCommand, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "vaultsync",
    version,
    about = "Keep note vaults in sync with their git remotes",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register and list vaults.
    Vault {
        #[command(subcommand)]
        command: VaultCommand,
    },

    /// Show repository state for every registered vault.
    Status(StatusArgs),

    /// Run the action a vault currently needs, or save a named revision.
    Sync(SyncArgs),

    /// Delete a vault's repository and its commit cache.
    Remove(RemoveArgs),

    /// Show, set or clear a vault's origin.
    Origin(OriginArgs),

    /// Turn periodic pull/push on or off for a vault.
    AutoPull(AutoPullArgs),

    /// Use an SSH key for a vault's remote.
    SshKey(SshKeyArgs),

    /// Authorize (or forget) OAuth access for a vault's remote.
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Print the one-line repository diagnostics for a vault.
    Diagnose(DiagnoseArgs),

    /// Run the auto-pull loop until interrupted.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Vault { command } => commands::vault::run(command),
        Commands::Status(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Remove(args) => args.run(),
        Commands::Origin(args) => args.run(),
        Commands::AutoPull(args) => args.run(),
        Commands::SshKey(args) => args.run(),
        Commands::Auth { command } => commands::auth::run(command),
        Commands::Diagnose(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output on stdout stays clean.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
