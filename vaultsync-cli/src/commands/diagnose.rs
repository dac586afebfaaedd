//! `vaultsync diagnose <vault>`

use anyhow::{Context, Result};
use clap::Args;

use vaultsync_sync::diagnostics_summary;

use super::App;

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// Vault label or settings key prefix.
    pub vault: String,
}

impl DiagnoseArgs {
    pub fn run(self) -> Result<()> {
        let app = App::load()?;
        let (tree, id) = app.vault(&self.vault)?;
        let summary = diagnostics_summary(&app.orchestrator, &tree, id)
            .context("failed to collect diagnostics")?;
        println!("{summary}");
        Ok(())
    }
}
