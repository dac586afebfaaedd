//! `vaultsync origin <vault> [<url> | --clear]`

use anyhow::{Context, Result};
use clap::Args;

use vaultsync_core::SettingsStore;

use super::App;

#[derive(Args, Debug)]
pub struct OriginArgs {
    /// Vault label or settings key prefix.
    pub vault: String,

    /// New origin URL. Without it, the resolved origin is printed.
    #[arg(conflicts_with = "clear")]
    pub url: Option<String>,

    /// Remove the vault's own origin setting.
    #[arg(long)]
    pub clear: bool,
}

impl OriginArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let (tree, id) = app.vault(&self.vault)?;
        let vault = tree.get(id).context("vault disappeared from the tree")?;

        if self.url.is_none() && !self.clear {
            match app.orchestrator.resolve_origin(&tree, id)? {
                Some(origin) => println!("{origin}"),
                None => println!("'{}' has no origin", vault.label),
            }
            return Ok(());
        }

        let mut settings = app
            .settings
            .load_settings(&vault.key)
            .with_context(|| format!("failed to load settings for '{}'", vault.label))?;
        settings.set_origin(self.url.as_deref().unwrap_or_default());
        app.settings
            .save_settings(&vault.key, &settings)
            .with_context(|| format!("failed to save settings for '{}'", vault.label))?;

        match settings.origin() {
            Some(origin) => println!("✓ '{}' origin set to {origin}", vault.label),
            None => println!("✓ '{}' origin cleared", vault.label),
        }
        Ok(())
    }
}
