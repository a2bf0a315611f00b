//! Concurrent batched message moves.
//!
//! [`BatchMover`] partitions a message set, moves each batch on its own
//! session, then verifies removal from the source on a fresh session. The
//! protocol offers no transactions: already-moved batches are never rolled
//! back, and a failed batch does not cancel its siblings.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::{Account, Message, DELETED_FLAG, GMAIL_TRASH};
use crate::error::{MailError, Result};
use crate::session::{sequence_set, FetchFields, FlagOperation, SessionFactory};

use super::folder_service::FolderService;
use super::DEFAULT_BATCH_SIZE;

/// Upper bound on simultaneously running move batches.
const MAX_CONCURRENT_BATCHES: usize = 4;

/// Moves message sets between folders in concurrent batches.
pub struct BatchMover {
    factory: Arc<dyn SessionFactory>,
    max_concurrent_batches: usize,
}

impl BatchMover {
    /// Creates a mover using the given session factory.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            max_concurrent_batches: MAX_CONCURRENT_BATCHES,
        }
    }

    /// Overrides the batch concurrency cap.
    pub fn with_max_concurrent_batches(mut self, cap: usize) -> Self {
        self.max_concurrent_batches = cap.max(1);
        self
    }

    /// Moves `messages` from `source` to `destination`.
    ///
    /// When the account's dialect keeps trash as a label rather than a
    /// folder, the whole operation is delegated to
    /// [`move_to_label_trash`](Self::move_to_label_trash). Otherwise the
    /// destination is created if missing, the messages are partitioned into
    /// batches of `batch_size` (the unified default when `None` or zero),
    /// moved concurrently with one session per batch, and removal from the
    /// source is verified afterwards on a fresh session.
    pub async fn move_messages(
        &self,
        account: &Account,
        messages: &[Message],
        source: &str,
        destination: &str,
        batch_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MailError::Cancelled);
        }
        if account.is_label_trash(destination) {
            return self.move_to_label_trash(account, source, messages).await;
        }

        // Confirm the source selects and the destination exists before
        // launching anything destructive.
        let mut session = self.factory.open_mailbox(account, source, false).await?;
        for message in messages {
            tracing::debug!(uid = message.uid, "queued for move");
        }
        FolderService::ensure_folder(session.as_mut(), destination).await?;
        let _ = session.logout().await;

        let batches = partition(messages, batch_size.unwrap_or(DEFAULT_BATCH_SIZE));
        let total = batches.len();
        tracing::debug!(
            count = messages.len(),
            total,
            source,
            destination,
            "moving messages in batches"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_batches));
        let mut tasks = JoinSet::new();
        for (index, batch) in batches.into_iter().enumerate() {
            let factory = Arc::clone(&self.factory);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let account = account.clone();
            let source = source.to_string();
            let destination = destination.to_string();
            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => return Err((index, MailError::Cancelled)),
                    permit = semaphore.acquire_owned() => {
                        permit.map_err(|_| (index, MailError::Cancelled))?
                    }
                };
                move_batch(factory.as_ref(), &account, &source, &destination, &batch)
                    .await
                    .map_err(|e| (index, e))
            });
        }

        // Every launched batch runs to completion; errors are aggregated,
        // not first-error-wins.
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((index, e))) => errors.push(format!("batch {index}: {e}")),
                Err(e) => errors.push(format!("batch task failed: {e}")),
            }
        }
        if !errors.is_empty() {
            return Err(MailError::BatchFailed { total, errors });
        }

        self.verify_removed(account, source, messages, cancel).await
    }

    /// Moves messages into the Gmail label trash without MOVE: UID COPY to
    /// the trash path, UID STORE `\Deleted` on the originals, then EXPUNGE.
    ///
    /// The sequence is strictly ordered with no rollback; a failure after
    /// the copy leaves the messages present in both source and trash.
    pub async fn move_to_label_trash(
        &self,
        account: &Account,
        folder: &str,
        messages: &[Message],
    ) -> Result<()> {
        let mut session = self.factory.open_mailbox(account, folder, false).await?;
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        let set = sequence_set(&uids);

        session.uid_copy(&set, GMAIL_TRASH).await?;
        session
            .uid_store(&set, FlagOperation::Add, &[DELETED_FLAG.to_string()])
            .await?;
        session.expunge().await?;
        let _ = session.logout().await;

        tracing::debug!(folder, count = messages.len(), "moved to label trash");
        Ok(())
    }

    /// Re-selects the source on a fresh session and probes each original UID
    /// individually. Any hit means a server silently ignored a MOVE it
    /// reported as successful.
    async fn verify_removed(
        &self,
        account: &Account,
        source: &str,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut session = self.factory.open_mailbox(account, source, false).await?;
        let mut remaining = Vec::new();
        for message in messages {
            if cancel.is_cancelled() {
                return Err(MailError::Cancelled);
            }
            let found = session
                .uid_fetch(&message.uid.to_string(), FetchFields::uid_only())
                .await?;
            if !found.is_empty() {
                remaining.push(message.uid);
            }
        }
        let _ = session.logout().await;

        if !remaining.is_empty() {
            return Err(MailError::Verification {
                folder: source.to_string(),
                uids: remaining,
            });
        }
        Ok(())
    }
}

async fn move_batch(
    factory: &dyn SessionFactory,
    account: &Account,
    source: &str,
    destination: &str,
    uids: &[u32],
) -> Result<()> {
    let mut session = factory.open_mailbox(account, source, false).await?;
    let set = sequence_set(uids);
    tracing::debug!(batch = %set, destination, "moving batch");
    session.uid_move(&set, destination).await?;
    let _ = session.logout().await;
    Ok(())
}

/// Partitions messages into contiguous batches of UIDs. A zero batch size
/// falls back to the unified default.
fn partition(messages: &[Message], batch_size: usize) -> Vec<Vec<u32>> {
    let batch_size = if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    };
    messages
        .chunks(batch_size)
        .map(|chunk| chunk.iter().map(|m| m.uid).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::session::fake::{account, gmail_account, message, FakeFactory};

    use super::*;

    fn two_messages() -> Vec<Message> {
        vec![message(1, "a@x.com"), message(2, "b@x.com")]
    }

    fn seeded_factory(folders: &[&str]) -> Arc<FakeFactory> {
        let factory = FakeFactory::new(folders);
        factory.add_message("INBOX", message(1, "a@x.com"));
        factory.add_message("INBOX", message(2, "b@x.com"));
        Arc::new(factory)
    }

    #[tokio::test]
    async fn batch_size_one_moves_each_message_independently() {
        let factory = seeded_factory(&["INBOX", "Archive"]);
        let mover = BatchMover::new(factory.clone());

        mover
            .move_messages(
                &account(),
                &two_messages(),
                "INBOX",
                "Archive",
                Some(1),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(factory.log_count("UID MOVE"), 2);
        // Both UIDs probed individually during verification.
        assert_eq!(factory.log_count("UID FETCH"), 2);
        assert_eq!(factory.uids("Archive"), vec![1, 2]);
        assert_eq!(factory.uids("INBOX"), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn each_batch_gets_its_own_session() {
        let factory = seeded_factory(&["INBOX", "Archive"]);
        let mover = BatchMover::new(factory.clone());

        mover
            .move_messages(
                &account(),
                &two_messages(),
                "INBOX",
                "Archive",
                Some(1),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // Initial check, one per batch, and the verification pass.
        assert_eq!(factory.state().lock().unwrap().sessions_opened, 4);
    }

    #[tokio::test]
    async fn verification_hit_fails_despite_successful_moves() {
        let factory = seeded_factory(&["INBOX", "Archive"]);
        factory.state().lock().unwrap().move_is_noop = true;
        let mover = BatchMover::new(factory.clone());

        let result = mover
            .move_messages(
                &account(),
                &two_messages(),
                "INBOX",
                "Archive",
                Some(1),
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(MailError::Verification { folder, uids }) => {
                assert_eq!(folder, "INBOX");
                assert_eq!(uids, vec![1, 2]);
            }
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_destination_hierarchy_is_created_first() {
        let factory = seeded_factory(&["INBOX"]);
        let mover = BatchMover::new(factory.clone());

        mover
            .move_messages(
                &account(),
                &two_messages(),
                "INBOX",
                "Archive/2024",
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let log = factory.log();
        let first_create = log.iter().position(|e| e == "CREATE Archive").unwrap();
        let second_create = log.iter().position(|e| e == "CREATE Archive/2024").unwrap();
        let first_move = log.iter().position(|e| e.starts_with("UID MOVE")).unwrap();
        assert!(first_create < second_create);
        assert!(second_create < first_move);
        assert_eq!(factory.uids("Archive/2024"), vec![1, 2]);
    }

    #[tokio::test]
    async fn batch_failures_are_aggregated() {
        let factory = seeded_factory(&["INBOX", "Archive"]);
        factory
            .state()
            .lock()
            .unwrap()
            .fail_on
            .insert("UID MOVE".to_string(), "NO move denied".to_string());
        let mover = BatchMover::new(factory.clone());

        let result = mover
            .move_messages(
                &account(),
                &two_messages(),
                "INBOX",
                "Archive",
                Some(1),
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(MailError::BatchFailed { total, errors }) => {
                assert_eq!(total, 2);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected aggregated batch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn label_trash_uses_copy_flag_expunge_in_order() {
        let factory = seeded_factory(&["INBOX", GMAIL_TRASH]);
        let mover = BatchMover::new(factory.clone());

        mover
            .move_messages(
                &gmail_account(),
                &two_messages(),
                "INBOX",
                GMAIL_TRASH,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let log = factory.log();
        let copy = log.iter().position(|e| e.starts_with("UID COPY")).unwrap();
        let store = log.iter().position(|e| e.starts_with("UID STORE")).unwrap();
        let expunge = log.iter().position(|e| e == "EXPUNGE").unwrap();
        assert!(copy < store && store < expunge);
        assert_eq!(factory.log_count("UID MOVE"), 0);
        assert_eq!(factory.log_count("LIST"), 0);
        assert_eq!(factory.uids(GMAIL_TRASH), vec![1, 2]);
        assert_eq!(factory.uids("INBOX"), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn label_trash_path_only_applies_to_dialect_accounts() {
        let factory = seeded_factory(&["INBOX", GMAIL_TRASH]);
        let mover = BatchMover::new(factory.clone());

        // Same destination name, non-Gmail account: a regular move.
        mover
            .move_messages(
                &account(),
                &two_messages(),
                "INBOX",
                GMAIL_TRASH,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(factory.log_count("UID MOVE"), 1);
        assert_eq!(factory.log_count("UID COPY"), 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_io() {
        let factory = seeded_factory(&["INBOX", "Archive"]);
        let mover = BatchMover::new(factory.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = mover
            .move_messages(&account(), &two_messages(), "INBOX", "Archive", None, &cancel)
            .await;

        assert!(matches!(result, Err(MailError::Cancelled)));
        assert!(factory.log().is_empty());
    }

    #[test]
    fn partition_defaults_and_splits() {
        let messages: Vec<Message> = (1..=250u32).map(|uid| message(uid, "a@x.com")).collect();
        let batches = partition(&messages, 0);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), DEFAULT_BATCH_SIZE);
        assert_eq!(batches[2].len(), 50);

        let batches = partition(&messages, 250);
        assert_eq!(batches.len(), 1);
    }
}
