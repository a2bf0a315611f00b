//! Accounts configuration.
//!
//! Accounts are read from `accounts.json` in the platform config directory
//! (e.g. `~/.config/mailsweep/accounts.json`) at startup. The file is never
//! written by the core; it is the user's to edit.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::Account;
use crate::error::{MailError, Result};

/// Name an account request resolves through the default flag instead of by
/// account name.
pub const DEFAULT_ACCOUNT: &str = "default";

/// The set of configured accounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Configured accounts, in file order.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl AccountsConfig {
    /// The platform path of the accounts file.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "panbanda", "mailsweep")
            .ok_or_else(|| MailError::Config("could not determine config directory".to_string()))?;
        Ok(dirs.config_dir().join("accounts.json"))
    }

    /// Loads the accounts file from the platform config directory. A missing
    /// file yields an empty configuration; account resolution reports the
    /// problem.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Loads the accounts file from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no accounts file, starting empty");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MailError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            MailError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Resolves an account by identifier. The identifier
    /// [`DEFAULT_ACCOUNT`] resolves to the account flagged `is_default`.
    pub fn account(&self, identifier: &str) -> Result<&Account> {
        if identifier == DEFAULT_ACCOUNT {
            tracing::debug!("looking for default account");
            self.accounts
                .iter()
                .find(|account| account.is_default)
                .ok_or_else(|| MailError::Config("no default account configured".to_string()))
        } else {
            tracing::debug!(account = identifier, "looking for named account");
            self.accounts
                .iter()
                .find(|account| account.name == identifier)
                .ok_or_else(|| MailError::Config(format!("account {identifier:?} not found")))
        }
    }
}
