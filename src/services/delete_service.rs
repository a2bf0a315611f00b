//! Message deletion.
//!
//! [`Deleter`] dispatches per account policy: purge accounts flag and
//! expunge in place (permanent), everything else moves to the resolved trash
//! folder through the batch mover.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::{Account, Message, DELETED_FLAG};
use crate::error::Result;
use crate::session::{sequence_set, FlagOperation, SessionFactory};

use super::folder_service::FolderService;
use super::move_service::BatchMover;

/// Deletes message sets according to the account's deletion policy.
pub struct Deleter {
    factory: Arc<dyn SessionFactory>,
    mover: BatchMover,
}

impl Deleter {
    /// Creates a deleter using the given session factory.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            mover: BatchMover::new(factory.clone()),
            factory,
        }
    }

    /// Deletes `messages` from `folder`. No-op on empty input.
    pub async fn delete_messages(
        &self,
        account: &Account,
        messages: &[Message],
        folder: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        if account.purge_on_delete {
            tracing::debug!(folder, count = messages.len(), "purging messages in place");
            self.purge(account, folder, messages).await
        } else {
            self.move_to_trash(account, folder, messages, cancel).await
        }
    }

    /// Permanently removes the messages: one session, UID STORE `\Deleted`,
    /// then EXPUNGE. No folder listing, no move.
    async fn purge(&self, account: &Account, folder: &str, messages: &[Message]) -> Result<()> {
        let mut session = self.factory.open_mailbox(account, folder, false).await?;
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        let set = sequence_set(&uids);
        session
            .uid_store(&set, FlagOperation::Add, &[DELETED_FLAG.to_string()])
            .await?;
        session.expunge().await?;
        let _ = session.logout().await;
        Ok(())
    }

    async fn move_to_trash(
        &self,
        account: &Account,
        folder: &str,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut session = self.factory.open(account).await?;
        let trash = FolderService::resolve_trash_folder(session.as_mut()).await?;
        let _ = session.logout().await;

        tracing::debug!(folder, trash = %trash, count = messages.len(), "moving messages to trash");
        self.mover
            .move_messages(account, messages, folder, &trash, None, cancel)
            .await
    }
}
