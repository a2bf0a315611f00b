//! Account domain types.
//!
//! An [`Account`] is a read-only descriptor loaded from configuration; the
//! core never mutates it. Credentials live in the accounts file alongside the
//! connection parameters.

use serde::{Deserialize, Serialize};

/// The folder Gmail exposes as its label-based trash.
pub const GMAIL_TRASH: &str = "[Gmail]/Trash";

/// An IMAP account configured for mailsweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Identifier used to select this account on the command line.
    pub name: String,
    /// Login username, usually the email address.
    pub user: String,
    /// Login password or app-specific password.
    pub password: String,
    /// IMAP server hostname.
    pub server: String,
    /// IMAP server port (typically 993 for TLS, 143 for plaintext).
    pub port: u16,
    /// Whether to connect over TLS.
    #[serde(default = "default_true")]
    pub use_tls: bool,
    /// Delete permanently (flag + expunge) instead of moving to trash.
    #[serde(default)]
    pub purge_on_delete: bool,
    /// Whether this account is selected when none is named.
    #[serde(default)]
    pub is_default: bool,
}

fn default_true() -> bool {
    true
}

impl Account {
    /// Returns the `host:port` dial address for this account.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Whether this account speaks the Gmail dialect.
    ///
    /// Detection is by hostname substring, not capability negotiation, so
    /// compatible relays on other hostnames are missed.
    pub fn is_gmail(&self) -> bool {
        self.server.contains("gmail.com")
    }

    /// Whether `folder` is this account's label-based trash, which cannot be
    /// targeted with a plain MOVE.
    pub fn is_label_trash(&self, folder: &str) -> bool {
        self.is_gmail() && folder == GMAIL_TRASH
    }
}
