//! Remote callbacks built from an [`AuthenticationHandler`].

use git2::{Cred, CredentialType, RemoteCallbacks};

use vaultsync_sync::AuthenticationHandler;

/// libgit2 asks again after every rejected credential; stop after this many.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

pub(crate) fn remote_callbacks(auth: Option<&AuthenticationHandler>) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0usize;

    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("credentials rejected by remote"));
        }

        match auth {
            Some(AuthenticationHandler::Password { username, password })
                if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
            {
                Cred::userpass_plaintext(username, password)
            }
            Some(AuthenticationHandler::SshKey {
                private_key_path,
                public_key_path,
                passphrase,
            }) if allowed.contains(CredentialType::SSH_KEY) => Cred::ssh_key(
                username_from_url.unwrap_or("git"),
                public_key_path.as_deref(),
                private_key_path,
                Some(passphrase.as_str()).filter(|p| !p.is_empty()),
            ),
            _ => {
                let config = git2::Config::open_default()?;
                Cred::credential_helper(&config, url, username_from_url)
                    .or_else(|_| Cred::default())
            }
        }
    });

    callbacks
}
