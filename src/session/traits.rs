//! Session trait definitions.
//!
//! [`MailSession`] is the minimal protocol surface the orchestration layer
//! needs from one authenticated connection. [`SessionFactory`] opens one
//! session per call; every concurrent task gets its own, since most servers
//! serialize commands per connection and correctness of command/response
//! pairing depends on strict per-session ordering.
//!
//! Both traits are constructor-injected so tests substitute fakes without
//! touching process-wide state.

use async_trait::async_trait;

use crate::domain::{Account, Message};
use crate::error::Result;

/// Status of a selected folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderStatus {
    /// Number of messages in the folder.
    pub exists: u32,
}

/// How a STORE command changes flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOperation {
    /// Add the flags to the current set.
    Add,
    /// Remove the flags from the current set.
    Remove,
    /// Replace the current set.
    Set,
}

impl FlagOperation {
    pub(crate) fn item(&self) -> &'static str {
        match self {
            FlagOperation::Add => "+FLAGS",
            FlagOperation::Remove => "-FLAGS",
            FlagOperation::Set => "FLAGS",
        }
    }
}

/// Which message attributes a fetch should return.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchFields {
    /// Parsed header fields (From/To/Subject).
    pub envelope: bool,
    /// Message flags.
    pub flags: bool,
    /// Server receive time.
    pub internal_date: bool,
    /// Message size in bytes.
    pub size: bool,
    /// Message UID.
    pub uid: bool,
}

impl FetchFields {
    /// Everything a search-result listing needs.
    pub fn all_metadata() -> Self {
        Self {
            envelope: true,
            flags: true,
            internal_date: true,
            size: true,
            uid: true,
        }
    }

    /// The minimum for tallying senders: envelope plus uid.
    pub fn sender_metadata() -> Self {
        Self {
            envelope: true,
            uid: true,
            ..Self::default()
        }
    }

    /// Just the uid, for existence probes.
    pub fn uid_only() -> Self {
        Self {
            uid: true,
            ..Self::default()
        }
    }

    /// Renders the fetch item specification, e.g. `(UID FLAGS ENVELOPE)`.
    pub fn item_spec(&self) -> String {
        let mut items = Vec::new();
        if self.uid {
            items.push("UID");
        }
        if self.flags {
            items.push("FLAGS");
        }
        if self.envelope {
            items.push("ENVELOPE");
        }
        if self.internal_date {
            items.push("INTERNALDATE");
        }
        if self.size {
            items.push("RFC822.SIZE");
        }
        format!("({})", items.join(" "))
    }
}

/// One authenticated protocol session.
///
/// All methods take `&mut self`: a session is owned by exactly one task and
/// commands on it are strictly ordered.
#[async_trait]
pub trait MailSession: Send {
    /// Selects a folder, read-preferring when `read_only` is set.
    async fn select(&mut self, folder: &str, read_only: bool) -> Result<FolderStatus>;

    /// Returns the server's advertised capabilities. Ordering is
    /// server-defined and not meaningful.
    async fn capabilities(&mut self) -> Result<Vec<String>>;

    /// Lists folder names matching `pattern` under `reference`.
    async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<String>>;

    /// Creates a folder.
    async fn create(&mut self, folder: &str) -> Result<()>;

    /// Searches the selected folder, returning matching UIDs.
    async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>>;

    /// Fetches messages by sequence-number set.
    async fn fetch(&mut self, sequence_set: &str, fields: FetchFields) -> Result<Vec<Message>>;

    /// Fetches messages by UID set.
    async fn uid_fetch(&mut self, uid_set: &str, fields: FetchFields) -> Result<Vec<Message>>;

    /// Moves messages by UID set into `destination`.
    async fn uid_move(&mut self, uid_set: &str, destination: &str) -> Result<()>;

    /// Copies messages by UID set into `destination`.
    async fn uid_copy(&mut self, uid_set: &str, destination: &str) -> Result<()>;

    /// Applies a flag change to messages by UID set.
    async fn uid_store(
        &mut self,
        uid_set: &str,
        operation: FlagOperation,
        flags: &[String],
    ) -> Result<()>;

    /// Permanently removes messages flagged `\Deleted` from the selected
    /// folder.
    async fn expunge(&mut self) -> Result<()>;

    /// Ends the session.
    async fn logout(&mut self) -> Result<()>;
}

/// Opens and authenticates protocol sessions, one per call.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Opens a new authenticated session for the account.
    async fn open(&self, account: &Account) -> Result<Box<dyn MailSession>>;

    /// Opens a session and selects `folder` on it.
    async fn open_mailbox(
        &self,
        account: &Account,
        folder: &str,
        read_only: bool,
    ) -> Result<Box<dyn MailSession>> {
        let mut session = self.open(account).await?;
        session.select(folder, read_only).await?;
        Ok(session)
    }
}
