//! Folder listing, hierarchy creation, and trash resolution.

use std::sync::Arc;

use crate::domain::{Account, GMAIL_TRASH};
use crate::error::Result;
use crate::session::{MailSession, SessionFactory};

/// Well-known trash folder names, highest priority first. The first entry
/// present in the mailbox wins, regardless of listing order.
pub const TRASH_FOLDER_PRIORITY: [&str; 4] =
    ["Trash", GMAIL_TRASH, "Deleted Items", "Deleted Messages"];

/// Name assumed when no well-known trash folder exists. Not verified or
/// created at resolution time.
pub const FALLBACK_TRASH_FOLDER: &str = "Deleted Items";

/// Folder operations against one account.
pub struct FolderService {
    factory: Arc<dyn SessionFactory>,
}

impl FolderService {
    /// Creates a folder service using the given session factory.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Lists every folder in the account's mailbox.
    pub async fn list_folders(&self, account: &Account) -> Result<Vec<String>> {
        let mut session = self.factory.open(account).await?;
        let folders = session.list("", "*").await?;
        let _ = session.logout().await;
        Ok(folders)
    }

    /// Ensures `path` exists, creating missing hierarchy segments
    /// parent-first. A creation failure is fatal and not retried.
    pub async fn ensure_folder(session: &mut dyn MailSession, path: &str) -> Result<()> {
        if Self::folder_exists(session, path).await? {
            return Ok(());
        }

        let mut prefix = String::new();
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if !Self::folder_exists(session, &prefix).await? {
                session.create(&prefix).await?;
                tracing::debug!(folder = %prefix, "created folder");
            }
        }
        Ok(())
    }

    /// Picks the mailbox's actual trash folder from [`TRASH_FOLDER_PRIORITY`],
    /// falling back to [`FALLBACK_TRASH_FOLDER`] when none is present.
    pub async fn resolve_trash_folder(session: &mut dyn MailSession) -> Result<String> {
        let folders = session.list("", "*").await?;
        for name in TRASH_FOLDER_PRIORITY {
            if folders.iter().any(|folder| folder == name) {
                return Ok(name.to_string());
            }
        }
        Ok(FALLBACK_TRASH_FOLDER.to_string())
    }

    async fn folder_exists(session: &mut dyn MailSession, path: &str) -> Result<bool> {
        let matches = session.list("", path).await?;
        Ok(matches.iter().any(|name| name == path))
    }
}
