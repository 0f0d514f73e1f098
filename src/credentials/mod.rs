//! Credential lookup for the portal login.
//!
//! Credentials are read through a small key-value interface so the login
//! flow never cares where they come from. The only backend today reads the
//! process environment (`LEUMI_USERNAME`, `LEUMI_PASSWORD`).

mod env;

pub use env::EnvCredentialStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::SecretString;

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";

/// A read-only key-value store for credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve a credential by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<SecretString>>;
}

/// Username/password pair for the portal login form.
#[derive(Debug)]
pub struct PortalCredentials {
    pub username: SecretString,
    pub password: SecretString,
}

impl PortalCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: SecretString::from(username.into()),
            password: SecretString::from(password.into()),
        }
    }

    /// Load both fields from `store`, failing if either is missing.
    pub async fn load(store: &dyn CredentialStore) -> Result<Self> {
        let username = store
            .get(USERNAME_KEY)
            .await?
            .context("Missing portal username")?;
        let password = store
            .get(PASSWORD_KEY)
            .await?
            .context("Missing portal password")?;
        Ok(Self { username, password })
    }
}
