//! `vaultsync auth login|logout <vault>`

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use vaultsync_core::credentials::clear_oauth_token;
use vaultsync_oauth::{OAuthConfig, OAuthPkceFlow};

use super::{runtime, App};

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Authorize in the browser and store the token for the vault.
    Login(LoginArgs),

    /// Forget the vault's OAuth token.
    Logout(LogoutArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Vault label or settings key prefix.
    pub vault: String,

    /// OAuth app client id [env: VAULTSYNC_OAUTH_CLIENT_ID]
    #[arg(long)]
    pub client_id: Option<String>,

    /// Redirect URI registered for the app [env: VAULTSYNC_OAUTH_REDIRECT_URI]
    #[arg(long)]
    pub redirect_uri: Option<String>,

    /// Backend endpoint that trades the code for a token [env: VAULTSYNC_OAUTH_TOKEN_URL]
    #[arg(long)]
    pub token_url: Option<String>,

    /// Callback URL to complete with; read from stdin when omitted.
    #[arg(long)]
    pub callback: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Vault label or settings key prefix.
    pub vault: String,
}

pub fn run(cmd: AuthCommand) -> Result<()> {
    match cmd {
        AuthCommand::Login(args) => login(args),
        AuthCommand::Logout(args) => logout(args),
    }
}

fn login(args: LoginArgs) -> Result<()> {
    let app = App::load()?;
    let (tree, id) = app.vault(&args.vault)?;
    let vault = tree.get(id).context("vault disappeared from the tree")?;

    let config = OAuthConfig::from_env().with_overrides(args.client_id, args.redirect_uri, args.token_url);
    let flow = OAuthPkceFlow::new(config);
    let url = flow.begin_authorization()?;

    println!("Open this URL to authorize '{}':", vault.label);
    println!("{url}");

    let callback = match args.callback {
        Some(callback) => callback,
        None => read_callback()?,
    };

    let stored = runtime()?.block_on(flow.complete_for_vault(
        &callback,
        app.settings.as_ref(),
        app.secrets.as_ref(),
        &vault.key,
    ))?;
    if !stored {
        bail!("no authorization was pending");
    }

    println!("✓ '{}' authorized", vault.label);
    Ok(())
}

fn read_callback() -> Result<String> {
    print!("Paste the callback URL: ");
    std::io::stdout().flush().context("failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read the callback URL")?;
    let line = line.trim();
    if line.is_empty() {
        bail!("no callback URL given");
    }
    Ok(line.to_string())
}

fn logout(args: LogoutArgs) -> Result<()> {
    let app = App::load()?;
    let (tree, id) = app.vault(&args.vault)?;
    let vault = tree.get(id).context("vault disappeared from the tree")?;

    clear_oauth_token(app.settings.as_ref(), app.secrets.as_ref(), &vault.key)
        .with_context(|| format!("failed to clear the OAuth token for '{}'", vault.label))?;
    println!("✓ '{}' signed out", vault.label);
    Ok(())
}
