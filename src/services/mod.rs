//! Orchestration services layer.
//!
//! Services coordinate multiple protocol sessions against one logical
//! mailbox. Every service takes its [`SessionFactory`](crate::session::SessionFactory)
//! by constructor injection, and every concurrent task it launches owns an
//! exclusive session.
//!
//! - [`Searcher`]: executes a criteria expression and returns matches newest first
//! - [`BatchMover`]: concurrent batched moves with post-condition verification
//! - [`Deleter`]: purge-in-place or move-to-trash per account policy
//! - [`SenderAggregator`]: per-sender tallies via a worker pool
//! - [`FolderService`]: folder listing, hierarchy creation, trash resolution

mod delete_service;
mod folder_service;
mod move_service;
mod search_service;
mod sender_service;

pub use delete_service::Deleter;
pub use folder_service::{FolderService, FALLBACK_TRASH_FOLDER, TRASH_FOLDER_PRIORITY};
pub use move_service::BatchMover;
pub use search_service::Searcher;
pub use sender_service::{tally_table, SenderAggregator};

/// Batch size used whenever a caller does not supply one. Every call site
/// that partitions messages routes through this single default; passing an
/// explicit `batch_size` (or a nonzero CLI flag) overrides it.
pub const DEFAULT_BATCH_SIZE: usize = 100;
