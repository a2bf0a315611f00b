//! Message domain types.
//!
//! A [`Message`] is the per-invocation snapshot of a server message: envelope
//! metadata plus the identifiers needed to address it in later commands. The
//! UID is stable for the lifetime of a session; the sequence number is
//! invalidated by any expunge and must never be carried across a mutation.

use chrono::{DateTime, Utc};

/// A single address parsed from an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name, when the envelope carries one.
    pub name: Option<String>,
    /// Local part of the address.
    pub mailbox: String,
    /// Domain part of the address.
    pub host: String,
}

impl Address {
    /// Formats the address as `mailbox@host`, or empty when either part is
    /// missing.
    pub fn email(&self) -> String {
        if self.mailbox.is_empty() || self.host.is_empty() {
            return String::new();
        }
        format!("{}@{}", self.mailbox, self.host)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.email())
    }
}

/// Parsed standard header fields, fetched without the body.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// From addresses.
    pub from: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Subject line, when present.
    pub subject: Option<String>,
}

/// A message as fetched from the server.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Position in the currently selected folder. Shifts after expunges.
    pub sequence_number: u32,
    /// Unique identifier, stable within a session.
    pub uid: u32,
    /// Envelope metadata, when fetched.
    pub envelope: Envelope,
    /// Server receive time, when fetched.
    pub internal_date: Option<DateTime<Utc>>,
    /// Raw flag names (e.g. `\Seen`).
    pub flags: Vec<String>,
    /// Message size in bytes, when fetched.
    pub size: Option<u32>,
}

impl Message {
    /// The first From address, formatted, or empty when the envelope has none.
    pub fn sender(&self) -> String {
        self.envelope
            .from
            .first()
            .map(Address::email)
            .unwrap_or_default()
    }
}

/// Number of messages observed from one sender. Derived and transient,
/// recomputed on every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderTally {
    /// Formatted sender address.
    pub sender: String,
    /// Number of messages from that sender.
    pub count: usize,
}

/// Formats a list of addresses, collapsing to `first (+n)` when more than one
/// is present.
pub fn format_addresses(addresses: &[Address]) -> String {
    match addresses {
        [] => String::new(),
        [only] => only.email(),
        [first, rest @ ..] => format!("{} (+{})", first.email(), rest.len()),
    }
}

/// Builds display rows for a list of messages: a header row followed by one
/// row per message. Terminal rendering stays in the binary.
pub fn message_table(messages: &[Message]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(messages.len() + 1);
    rows.push(vec![
        "UID".to_string(),
        "Date".to_string(),
        "From".to_string(),
        "To".to_string(),
        "Subject".to_string(),
    ]);
    for message in messages {
        rows.push(vec![
            message.uid.to_string(),
            message
                .internal_date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            format_addresses(&message.envelope.from),
            format_addresses(&message.envelope.to),
            message.envelope.subject.clone().unwrap_or_default(),
        ]);
    }
    rows
}
