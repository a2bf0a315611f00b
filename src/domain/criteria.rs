//! Search criteria composition.
//!
//! [`SearchOptions`] captures the caller's optional filters; absence of a
//! field means "no filter on that dimension". Options compose into a
//! [`SearchCriteria`] expression tree either conjunctively ([`SearchCriteria::and`])
//! or disjunctively ([`SearchCriteria::or`]), and the tree renders to the
//! query string the session primitive sends with UID SEARCH.
//!
//! AND-composition sets multiple fields on one node. OR-composition nests
//! exactly two children per node, chained right-associatively for more than
//! two alternatives.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{MailError, Result};

/// The `\Seen` system flag.
pub const SEEN_FLAG: &str = "\\Seen";

/// The `\Deleted` system flag.
pub const DELETED_FLAG: &str = "\\Deleted";

/// Optional search parameters. Each field is present-or-absent, not merely
/// empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOptions {
    /// Match messages addressed to this string.
    pub to: Option<String>,
    /// Match messages from this string.
    pub from: Option<String>,
    /// Match this subject.
    pub subject: Option<String>,
    /// Match messages received/sent on or after this date.
    pub start_date: Option<NaiveDate>,
    /// Match messages received/sent on or before this date (inclusive).
    pub end_date: Option<NaiveDate>,
    /// Match messages carrying `\Seen`.
    pub seen: Option<bool>,
    /// Match messages lacking `\Seen`.
    pub unseen: Option<bool>,
}

impl SearchOptions {
    /// Serializes the options for debug logging.
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "<unserializable>".to_string())
    }

    fn seen_requested(&self) -> bool {
        self.seen == Some(true)
    }

    fn unseen_requested(&self) -> bool {
        self.unseen == Some(true)
    }
}

/// One node of a search-criteria expression tree.
///
/// A node with several fields set is their conjunction; a node with `or` set
/// is the disjunction of exactly two children. The builders never produce a
/// node that is both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    /// Header filters: field name to match values.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Received on or after this date.
    pub since: Option<NaiveDate>,
    /// Received strictly before this date.
    pub before: Option<NaiveDate>,
    /// Sent on or after this date.
    pub sent_since: Option<NaiveDate>,
    /// Sent strictly before this date.
    pub sent_before: Option<NaiveDate>,
    /// Flags the message must carry.
    pub with_flags: Vec<String>,
    /// Flags the message must lack.
    pub without_flags: Vec<String>,
    /// Disjunction of exactly two children.
    pub or: Option<Box<(SearchCriteria, SearchCriteria)>>,
}

impl SearchCriteria {
    /// Builds a single conjunctive criteria node from the present options.
    ///
    /// Both dates present sets Since/SentSince to the start and
    /// Before/SentBefore to the day after the end, making the end date
    /// inclusive through an exclusive next-day bound. Requesting both seen
    /// and unseen is contradictory and rejected before any I/O.
    pub fn and(opts: &SearchOptions) -> Result<Self> {
        if opts.seen_requested() && opts.unseen_requested() {
            return Err(MailError::InvalidSearch(
                "seen and unseen cannot both be requested in an AND search".to_string(),
            ));
        }

        let mut criteria = Self::default();
        for (field, value) in header_fields(opts) {
            criteria.headers.insert(field.to_string(), vec![value]);
            tracing::debug!(field, "adding header criterion");
        }
        if let Some(start) = opts.start_date {
            criteria.since = Some(start);
            criteria.sent_since = Some(start);
        }
        if let Some(end) = opts.end_date {
            let bound = next_day(end)?;
            criteria.before = Some(bound);
            criteria.sent_before = Some(bound);
        }
        if opts.seen_requested() {
            criteria.with_flags.push(SEEN_FLAG.to_string());
        }
        if opts.unseen_requested() {
            criteria.without_flags.push(SEEN_FLAG.to_string());
        }

        tracing::debug!(query = %criteria.render(), "built AND criteria");
        Ok(criteria)
    }

    /// Builds a disjunctive criteria tree: one leaf per present option,
    /// right-folded into a binary OR chain.
    ///
    /// When both date bounds are present they form a single combined leaf;
    /// otherwise each bound is its own leaf. Zero leaves matches everything;
    /// a single leaf is returned unwrapped.
    pub fn or(opts: &SearchOptions) -> Result<Self> {
        let mut leaves = Vec::new();
        for (field, value) in header_fields(opts) {
            let mut leaf = Self::default();
            leaf.headers.insert(field.to_string(), vec![value]);
            leaves.push(leaf);
        }
        leaves.extend(date_leaves(opts)?);
        if opts.seen_requested() {
            leaves.push(Self {
                with_flags: vec![SEEN_FLAG.to_string()],
                ..Self::default()
            });
        }
        if opts.unseen_requested() {
            leaves.push(Self {
                without_flags: vec![SEEN_FLAG.to_string()],
                ..Self::default()
            });
        }

        let criteria = leaves
            .into_iter()
            .rev()
            .reduce(|right, left| Self {
                or: Some(Box::new((left, right))),
                ..Self::default()
            })
            .unwrap_or_default();
        tracing::debug!(query = %criteria.render(), "built OR criteria");
        Ok(criteria)
    }

    /// Renders the tree as a UID SEARCH query string. An empty tree renders
    /// as `ALL`.
    pub fn render(&self) -> String {
        let terms = self.terms();
        if terms.is_empty() {
            "ALL".to_string()
        } else {
            terms.join(" ")
        }
    }

    fn terms(&self) -> Vec<String> {
        let mut terms = Vec::new();
        // Well-known header fields first, in a fixed order, then the rest.
        for field in ["To", "From", "Subject"] {
            if let Some(values) = self.headers.get(field) {
                for value in values {
                    terms.push(format!("{} {}", field.to_uppercase(), quote(value)));
                }
            }
        }
        for (field, values) in &self.headers {
            if matches!(field.as_str(), "To" | "From" | "Subject") {
                continue;
            }
            for value in values {
                terms.push(format!("HEADER {} {}", quote(field), quote(value)));
            }
        }
        if let Some(date) = self.since {
            terms.push(format!("SINCE {}", date_text(date)));
        }
        if let Some(date) = self.before {
            terms.push(format!("BEFORE {}", date_text(date)));
        }
        if let Some(date) = self.sent_since {
            terms.push(format!("SENTSINCE {}", date_text(date)));
        }
        if let Some(date) = self.sent_before {
            terms.push(format!("SENTBEFORE {}", date_text(date)));
        }
        for flag in &self.with_flags {
            terms.push(flag_term(flag, false));
        }
        for flag in &self.without_flags {
            terms.push(flag_term(flag, true));
        }
        if let Some(children) = &self.or {
            terms.push(format!(
                "OR {} {}",
                operand(&children.0),
                operand(&children.1)
            ));
        }
        terms
    }
}

fn header_fields(opts: &SearchOptions) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();
    if let Some(to) = &opts.to {
        fields.push(("To", to.clone()));
    }
    if let Some(from) = &opts.from {
        fields.push(("From", from.clone()));
    }
    if let Some(subject) = &opts.subject {
        fields.push(("Subject", subject.clone()));
    }
    fields
}

fn date_leaves(opts: &SearchOptions) -> Result<Vec<SearchCriteria>> {
    let mut leaves = Vec::new();
    match (opts.start_date, opts.end_date) {
        (Some(start), Some(end)) => {
            let bound = next_day(end)?;
            leaves.push(SearchCriteria {
                since: Some(start),
                before: Some(bound),
                sent_since: Some(start),
                sent_before: Some(bound),
                ..SearchCriteria::default()
            });
        }
        (Some(start), None) => leaves.push(SearchCriteria {
            since: Some(start),
            sent_since: Some(start),
            ..SearchCriteria::default()
        }),
        (None, Some(end)) => {
            let bound = next_day(end)?;
            leaves.push(SearchCriteria {
                before: Some(bound),
                sent_before: Some(bound),
                ..SearchCriteria::default()
            });
        }
        (None, None) => {}
    }
    Ok(leaves)
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| MailError::InvalidSearch(format!("date out of range: {date}")))
}

/// IMAP date-text, e.g. `1-Jan-2024`.
fn date_text(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}

fn flag_term(flag: &str, negated: bool) -> String {
    let keyword = match flag {
        "\\Seen" => "SEEN",
        "\\Answered" => "ANSWERED",
        "\\Flagged" => "FLAGGED",
        "\\Deleted" => "DELETED",
        "\\Draft" => "DRAFT",
        other => {
            return if negated {
                format!("UNKEYWORD {}", quote(other))
            } else {
                format!("KEYWORD {}", quote(other))
            }
        }
    };
    if negated {
        format!("UN{keyword}")
    } else {
        keyword.to_string()
    }
}

/// Renders an OR operand, parenthesizing when it is not a single term.
fn operand(criteria: &SearchCriteria) -> String {
    let terms = criteria.terms();
    match terms.len() {
        0 => "ALL".to_string(),
        1 => terms.into_iter().next().unwrap_or_default(),
        _ => format!("({})", terms.join(" ")),
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
