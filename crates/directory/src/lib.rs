//! ES4C Directory: mirrors account lifecycle jobs into an Active-Directory-compatible
//! LDAP server (Samba AD DC).
//!
//! [`worker::Worker`] pulls jobs from the queue, [`tasks`] turns each job into
//! directory calls, and [`client::LdapDirectory`] talks to the server.

pub mod client;
pub mod error;
pub mod models;
pub mod tasks;
pub mod worker;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{DirectoryClient, LdapDirectory};
pub use error::DirectoryError;
pub use tasks::ProvisioningDefaults;
pub use worker::Worker;
