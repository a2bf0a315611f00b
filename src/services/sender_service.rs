//! Per-sender message tallies.
//!
//! [`SenderAggregator`] fetches only the From envelope and minimal metadata
//! for every message in a folder, drains them through a fixed worker pool
//! into one mutex-guarded tally map, then sorts the retained entries by
//! count. Large result sets use a recursive parallel merge sort on OS
//! threads; smaller ones sort in place.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::{Account, Message, SenderTally};
use crate::error::{MailError, Result};
use crate::session::{FetchFields, SessionFactory};

/// Fixed size of the tally worker pool.
const SENDER_WORKERS: usize = 4;

/// Result sets larger than this are sorted with the parallel merge sort.
const PARALLEL_SORT_THRESHOLD: usize = 1000;

/// Messages fetched per FETCH round-trip when scanning a folder.
const FETCH_CHUNK_SIZE: u32 = 1000;

/// Tallies senders across a folder.
pub struct SenderAggregator {
    factory: Arc<dyn SessionFactory>,
}

impl SenderAggregator {
    /// Creates an aggregator using the given session factory.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Counts messages per sender in `folder`, dropping senders with fewer
    /// than `threshold` messages. Results are in strictly descending count
    /// order, ties broken by sender address.
    pub async fn count_by_sender(
        &self,
        account: &Account,
        folder: &str,
        threshold: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SenderTally>> {
        let messages = self.fetch_sender_metadata(account, folder, cancel).await?;
        let counts = tally_senders(messages).await;

        let mut tallies: Vec<SenderTally> = counts
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .map(|(sender, count)| SenderTally { sender, count })
            .collect();

        if tallies.len() > PARALLEL_SORT_THRESHOLD {
            tallies = tokio::task::spawn_blocking(move || {
                parallel_merge_sort(&mut tallies);
                tallies
            })
            .await
            .map_err(|_| MailError::Cancelled)?;
        } else {
            tallies.sort_unstable_by(compare_tallies);
        }
        Ok(tallies)
    }

    /// Fetches From-envelope metadata for every message in the folder, in
    /// sequence-number chunks. Empty folders short-circuit without a fetch.
    async fn fetch_sender_metadata(
        &self,
        account: &Account,
        folder: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        let mut session = self.factory.open(account).await?;
        let status = session.select(folder, true).await?;
        if status.exists == 0 {
            let _ = session.logout().await;
            return Ok(Vec::new());
        }

        let mut messages = Vec::with_capacity(status.exists as usize);
        let mut start = 1u32;
        while start <= status.exists {
            if cancel.is_cancelled() {
                return Err(MailError::Cancelled);
            }
            let end = start.saturating_add(FETCH_CHUNK_SIZE - 1).min(status.exists);
            let chunk = session
                .fetch(&format!("{start}:{end}"), FetchFields::sender_metadata())
                .await?;
            messages.extend(chunk);
            start = end + 1;
        }
        let _ = session.logout().await;
        Ok(messages)
    }
}

/// Drains messages through [`SENDER_WORKERS`] tasks, each extracting the
/// first From address and bumping the shared tally under one coarse mutex.
async fn tally_senders(messages: Vec<Message>) -> HashMap<String, usize> {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = mpsc::channel::<Message>(SENDER_WORKERS);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    let mut workers = JoinSet::new();
    for _ in 0..SENDER_WORKERS {
        let rx = Arc::clone(&rx);
        let counts = Arc::clone(&counts);
        workers.spawn(async move {
            loop {
                let message = { rx.lock().await.recv().await };
                let Some(message) = message else { break };
                let sender = message.sender();
                if sender.is_empty() {
                    continue;
                }
                let mut counts = counts.lock().unwrap_or_else(|e| e.into_inner());
                *counts.entry(sender).or_insert(0) += 1;
            }
        });
    }

    for message in messages {
        if tx.send(message).await.is_err() {
            break;
        }
    }
    drop(tx);
    while workers.join_next().await.is_some() {}

    match Arc::try_unwrap(counts) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(|e| e.into_inner()),
        Err(_) => HashMap::new(),
    }
}

fn compare_tallies(a: &SenderTally, b: &SenderTally) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| a.sender.cmp(&b.sender))
}

/// Recursive parallel merge sort: split, recurse concurrently on scoped OS
/// threads, merge. Sub-slices at or below the threshold sort in place.
fn parallel_merge_sort(data: &mut [SenderTally]) {
    if data.len() <= PARALLEL_SORT_THRESHOLD {
        data.sort_unstable_by(compare_tallies);
        return;
    }
    let mid = data.len() / 2;
    let (left, right) = data.split_at_mut(mid);
    std::thread::scope(|scope| {
        scope.spawn(|| parallel_merge_sort(left));
        parallel_merge_sort(right);
    });
    merge(data, mid);
}

fn merge(data: &mut [SenderTally], mid: usize) {
    let mut merged = Vec::with_capacity(data.len());
    let (mut i, mut j) = (0, mid);
    while i < mid && j < data.len() {
        if compare_tallies(&data[i], &data[j]) != Ordering::Greater {
            merged.push(data[i].clone());
            i += 1;
        } else {
            merged.push(data[j].clone());
            j += 1;
        }
    }
    merged.extend(data[i..mid].iter().cloned());
    merged.extend(data[j..].iter().cloned());
    data.clone_from_slice(&merged);
}

/// Builds display rows: a header followed by one row per retained sender.
pub fn tally_table(tallies: &[SenderTally]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(tallies.len() + 1);
    rows.push(vec!["Sender".to_string(), "Number of Messages".to_string()]);
    for tally in tallies {
        rows.push(vec![tally.sender.clone(), tally.count.to_string()]);
    }
    rows
}
