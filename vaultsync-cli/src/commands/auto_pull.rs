//! `vaultsync auto-pull <vault> on|off`

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use vaultsync_core::SettingsStore;

use super::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct AutoPullArgs {
    /// Vault label or settings key prefix.
    pub vault: String,

    #[arg(value_enum)]
    pub state: Switch,
}

impl AutoPullArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let (tree, id) = app.vault(&self.vault)?;
        let vault = tree.get(id).context("vault disappeared from the tree")?;

        let mut settings = app
            .settings
            .load_settings(&vault.key)
            .with_context(|| format!("failed to load settings for '{}'", vault.label))?;
        settings.auto_pull = self.state == Switch::On;
        app.settings
            .save_settings(&vault.key, &settings)
            .with_context(|| format!("failed to save settings for '{}'", vault.label))?;

        let state = if settings.auto_pull { "on" } else { "off" };
        println!("✓ '{}' auto-pull {state}", vault.label);
        Ok(())
    }
}
