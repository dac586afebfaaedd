//! `vaultsync remove <vault>`

use anyhow::{Context, Result};
use clap::Args;

use vaultsync_sync::TracingProgress;

use super::App;

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Vault label or settings key prefix.
    pub vault: String,
}

impl RemoveArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let (tree, id) = app.vault(&self.vault)?;
        let label = tree.get(id).map(|v| v.label.clone()).unwrap_or_default();

        if !app.orchestrator.has_repository(&tree, id)? {
            println!("'{label}' has no repository");
            return Ok(());
        }

        app.orchestrator
            .remove_repository(&tree, id, &TracingProgress)
            .with_context(|| format!("failed to remove the repository of '{label}'"))?;
        println!("✓ Removed the repository of '{label}'");
        Ok(())
    }
}
