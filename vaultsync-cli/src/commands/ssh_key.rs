//! `vaultsync ssh-key <vault> --private FILE [--public FILE] [--passphrase P]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use vaultsync_core::credentials::set_ssh_key;
use vaultsync_core::{AuthMode, SettingsStore};
use vaultsync_sync::auth::remove_ssh_key;

use super::App;

#[derive(Args, Debug)]
pub struct SshKeyArgs {
    /// Vault label or settings key prefix.
    pub vault: String,

    /// Private key file.
    #[arg(long = "private", value_name = "FILE", required_unless_present = "remove")]
    pub private_key: Option<PathBuf>,

    /// Public key file.
    #[arg(long = "public", value_name = "FILE")]
    pub public_key: Option<PathBuf>,

    #[arg(long)]
    pub passphrase: Option<String>,

    /// Forget the vault's SSH key and delete the installed copy.
    #[arg(long, conflicts_with_all = ["private_key", "public_key", "passphrase"])]
    pub remove: bool,
}

impl SshKeyArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let (tree, id) = app.vault(&self.vault)?;
        let vault = tree.get(id).context("vault disappeared from the tree")?;

        if self.remove {
            let mut settings = app.settings.load_settings(&vault.key)?;
            settings.clear_ssh_key();
            if settings.auth_mode == Some(AuthMode::SshKey) {
                settings.auth_mode = None;
            }
            app.settings.save_settings(&vault.key, &settings)?;
            remove_ssh_key(app.orchestrator.keys_dir(), &vault.key)
                .context("failed to delete installed key files")?;
            println!("✓ '{}' SSH key removed", vault.label);
            return Ok(());
        }

        let Some(private_path) = self.private_key.as_ref() else {
            bail!("--private is required");
        };
        let private_key = std::fs::read_to_string(private_path)
            .with_context(|| format!("failed to read {}", private_path.display()))?;
        let public_key = match self.public_key.as_ref() {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
            ),
            None => None,
        };

        set_ssh_key(
            app.settings.as_ref(),
            app.secrets.as_ref(),
            &vault.key,
            &private_key,
            public_key.as_deref(),
            self.passphrase.as_deref(),
        )
        .with_context(|| format!("failed to save the SSH key for '{}'", vault.label))?;
        println!("✓ '{}' uses SSH key {}", vault.label, private_path.display());
        Ok(())
    }
}
