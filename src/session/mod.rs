//! Protocol session layer.
//!
//! The [`MailSession`] and [`SessionFactory`] traits define the surface the
//! orchestration services need; [`ImapSessionFactory`] is the async-imap
//! implementation. Sessions are exclusive to one task and never shared.

mod imap;
mod traits;

#[cfg(test)]
pub(crate) mod fake;

pub use imap::ImapSessionFactory;
pub use traits::{FetchFields, FlagOperation, FolderStatus, MailSession, SessionFactory};

/// Encodes UIDs as a compact sequence set, collapsing runs into ranges:
/// `[1, 2, 3, 7]` becomes `"1:3,7"`.
pub fn sequence_set(uids: &[u32]) -> String {
    let mut uids: Vec<u32> = uids.to_vec();
    uids.sort_unstable();
    uids.dedup();

    let mut parts = Vec::new();
    let mut run: Option<(u32, u32)> = None;
    for uid in uids {
        match run {
            Some((start, end)) if uid == end + 1 => run = Some((start, uid)),
            Some((start, end)) => {
                parts.push(encode_run(start, end));
                run = Some((uid, uid));
            }
            None => run = Some((uid, uid)),
        }
    }
    if let Some((start, end)) = run {
        parts.push(encode_run(start, end));
    }
    parts.join(",")
}

fn encode_run(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}:{end}")
    }
}
