//! mailsweep - a shell-driven bulk editor for IMAP mailboxes
//!
//! This crate provides the orchestration layer for bulk mailbox edits:
//! criteria-based search, concurrent batched moves with post-condition
//! verification, policy-driven deletion, recursive folder creation, and
//! per-sender tallies. The wire protocol itself comes from async-imap,
//! behind the [`session::MailSession`] seam.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod session;
