//! Criteria-based message search.
//!
//! [`Searcher`] executes one rendered criteria expression against a folder
//! and returns the matches newest first. Zero matches short-circuit without
//! a fetch round-trip.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::{Account, Message, SearchCriteria};
use crate::error::{MailError, Result};
use crate::session::{sequence_set, FetchFields, SessionFactory};

/// Searches folders by criteria expression.
pub struct Searcher {
    factory: Arc<dyn SessionFactory>,
}

impl Searcher {
    /// Creates a searcher using the given session factory.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Finds messages in `folder` matching `criteria`, sorted by internal
    /// date descending (ties broken by uid ascending).
    pub async fn search(
        &self,
        account: &Account,
        folder: &str,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        let mut session = self.factory.open(account).await?;
        session.select(folder, true).await?;

        let capabilities = session.capabilities().await?;
        tracing::debug!(?capabilities, "server capabilities");

        let query = criteria.render();
        tracing::debug!(folder, %query, "searching");
        let uids = session.uid_search(&query).await?;
        if uids.is_empty() {
            let _ = session.logout().await;
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(MailError::Cancelled);
        }

        let mut messages = session
            .uid_fetch(&sequence_set(&uids), FetchFields::all_metadata())
            .await?;
        let _ = session.logout().await;

        messages.sort_unstable_by(|a, b| {
            b.internal_date
                .cmp(&a.internal_date)
                .then_with(|| a.uid.cmp(&b.uid))
        });
        Ok(messages)
    }
}
