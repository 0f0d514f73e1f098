//! Environment-variable credential backend.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;

use super::CredentialStore;

/// Reads `{PREFIX}_{KEY}` (upper-cased) from the environment.
///
/// Values are snapshotted at construction so a run sees a consistent set.
pub struct EnvCredentialStore {
    prefix: String,
    vars: HashMap<String, String>,
}

impl EnvCredentialStore {
    /// Snapshot the current process environment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Build a store from explicit variables instead of the process environment.
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key).to_uppercase()
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<SecretString>> {
        Ok(self
            .vars
            .get(&self.var_name(key))
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone())))
    }
}
