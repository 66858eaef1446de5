//! Client registry: the dashboard-based retrieval path is configured per
//! client, each with a named set of upstream ad accounts and env-var
//! references to its credentials.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tables::EntityId;
use crate::ConfigError;

/// One upstream ad account belonging to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub id: String,
}

/// One configured client of the report-export sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    /// Env var holding the dashboard username.
    pub user_secret: String,
    /// Env var holding the dashboard password.
    pub password_secret: String,
    pub accounts: Vec<AccountConfig>,
}

/// Resolved credentials for one client. Opaque strings; how they are used to
/// capture the report template is outside this crate.
#[derive(Clone)]
pub struct ClientCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ClientConfig {
    /// The account ids of this client as the entity-id set for a run.
    #[must_use]
    pub fn account_ids(&self) -> Vec<EntityId> {
        self.accounts
            .iter()
            .map(|a| EntityId(a.id.clone()))
            .collect()
    }

    /// Resolves this client's credentials through the given secret lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecret`] if either referenced secret is
    /// not available.
    pub fn resolve_credentials<F>(&self, lookup: F) -> Result<ClientCredentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing = |var: &str| ConfigError::MissingSecret {
            client: self.name.clone(),
            var: var.to_string(),
        };
        let username = lookup(&self.user_secret).ok_or_else(|| missing(&self.user_secret))?;
        let password =
            lookup(&self.password_secret).ok_or_else(|| missing(&self.password_secret))?;
        Ok(ClientCredentials { username, password })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientsFile {
    pub clients: Vec<ClientConfig>,
}

impl ClientsFile {
    #[must_use]
    pub fn client(&self, name: &str) -> Option<&ClientConfig> {
        self.clients.iter().find(|c| c.name == name)
    }
}

/// Load and validate the client registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails
/// validation.
pub fn load_clients(path: &Path) -> Result<ClientsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ClientsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: ClientsFile = serde_yaml::from_str(&content)?;
    validate_clients(&file)?;
    Ok(file)
}

fn validate_clients(file: &ClientsFile) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for client in &file.clients {
        if client.name.trim().is_empty() {
            return Err(ConfigError::InvalidClients(
                "client with empty name".to_string(),
            ));
        }
        if !seen.insert(client.name.as_str()) {
            return Err(ConfigError::InvalidClients(format!(
                "duplicate client name: {}",
                client.name
            )));
        }
        if client.accounts.is_empty() {
            return Err(ConfigError::InvalidClients(format!(
                "client {} has no accounts",
                client.name
            )));
        }
        let mut account_ids = std::collections::HashSet::new();
        for account in &client.accounts {
            if account.id.trim().is_empty() {
                return Err(ConfigError::InvalidClients(format!(
                    "client {} has an account with an empty id",
                    client.name
                )));
            }
            if !account_ids.insert(account.id.as_str()) {
                return Err(ConfigError::InvalidClients(format!(
                    "client {} has duplicate account id {}",
                    client.name, account.id
                )));
            }
        }
    }
    Ok(())
}
