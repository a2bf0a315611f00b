//! Domain layer types for mailsweep.
//!
//! Core types shared across the orchestration services: accounts, messages,
//! and search-criteria composition. Everything here is created per command
//! invocation and discarded at completion; the core owns no persistent state.

mod account;
mod criteria;
mod message;

pub use account::{Account, GMAIL_TRASH};
pub use criteria::{SearchCriteria, SearchOptions, DELETED_FLAG, SEEN_FLAG};
pub use message::{format_addresses, message_table, Address, Envelope, Message, SenderTally};
