//! # vaultsync-git2
//!
//! The git engine used by `vaultsync`: [`Git2Engine`] implements
//! `vaultsync_sync::GitEngine` on top of libgit2.

mod credentials;
mod engine;
mod error;
mod repository;

pub use engine::Git2Engine;
pub use repository::Git2Repository;
