//! In-memory fake mailbox shared by unit tests.
//!
//! [`FakeFactory`] hands out sessions over one shared [`MailboxState`],
//! recording every operation in an ordered log. Tests inject failures per
//! operation keyword and flip `move_is_noop` to simulate servers that
//! silently ignore MOVE.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{Account, Address, Envelope, Message};
use crate::error::{MailError, Result};

use super::traits::{FetchFields, FlagOperation, FolderStatus, MailSession, SessionFactory};

#[derive(Debug, Default)]
pub(crate) struct MailboxState {
    pub folders: Vec<String>,
    pub messages: HashMap<String, Vec<Message>>,
    pub log: Vec<String>,
    pub fail_on: HashMap<String, String>,
    pub search_result: Option<Vec<u32>>,
    pub move_is_noop: bool,
    pub sessions_opened: usize,
}

impl MailboxState {
    fn check_failure(&mut self, operation: &str) -> Result<()> {
        if let Some(message) = self.fail_on.get(operation) {
            return Err(MailError::protocol(operation, None, message));
        }
        Ok(())
    }
}

pub(crate) struct FakeFactory {
    state: Arc<Mutex<MailboxState>>,
}

impl FakeFactory {
    pub fn new(folders: &[&str]) -> Self {
        let state = MailboxState {
            folders: folders.iter().map(|f| f.to_string()).collect(),
            ..MailboxState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> Arc<Mutex<MailboxState>> {
        self.state.clone()
    }

    pub fn add_message(&self, folder: &str, message: Message) {
        let mut state = self.state.lock().unwrap();
        state.messages.entry(folder.to_string()).or_default().push(message);
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn log_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn uids(&self, folder: &str) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(folder)
            .map(|messages| messages.iter().map(|m| m.uid).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self, _account: &Account) -> Result<Box<dyn MailSession>> {
        let mut state = self.state.lock().unwrap();
        state.check_failure("OPEN")?;
        state.sessions_opened += 1;
        state.log.push("OPEN".to_string());
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
            selected: None,
        }))
    }
}

pub(crate) struct FakeSession {
    state: Arc<Mutex<MailboxState>>,
    selected: Option<String>,
}

impl FakeSession {
    fn selected_folder(&self) -> Result<String> {
        self.selected
            .clone()
            .ok_or_else(|| MailError::protocol("FETCH", None, "no folder selected"))
    }
}

#[async_trait]
impl MailSession for FakeSession {
    async fn select(&mut self, folder: &str, read_only: bool) -> Result<FolderStatus> {
        let mut state = self.state.lock().unwrap();
        let verb = if read_only { "EXAMINE" } else { "SELECT" };
        state.log.push(format!("{verb} {folder}"));
        state.check_failure(verb)?;
        if !state.folders.iter().any(|f| f == folder) {
            return Err(MailError::protocol(verb, Some(folder), "no such folder"));
        }
        let exists = state.messages.get(folder).map(Vec::len).unwrap_or(0) as u32;
        self.selected = Some(folder.to_string());
        Ok(FolderStatus { exists })
    }

    async fn capabilities(&mut self) -> Result<Vec<String>> {
        Ok(vec!["IMAP4rev1".to_string(), "MOVE".to_string()])
    }

    async fn list(&mut self, _reference: &str, pattern: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("LIST {pattern}"));
        state.check_failure("LIST")?;
        let names = if pattern == "*" {
            state.folders.clone()
        } else {
            state
                .folders
                .iter()
                .filter(|f| f.as_str() == pattern)
                .cloned()
                .collect()
        };
        Ok(names)
    }

    async fn create(&mut self, folder: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("CREATE {folder}"));
        state.check_failure("CREATE")?;
        state.folders.push(folder.to_string());
        Ok(())
    }

    async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        let folder = self.selected_folder()?;
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("UID SEARCH {query}"));
        state.check_failure("UID SEARCH")?;
        if let Some(uids) = &state.search_result {
            return Ok(uids.clone());
        }
        Ok(state
            .messages
            .get(&folder)
            .map(|messages| messages.iter().map(|m| m.uid).collect())
            .unwrap_or_default())
    }

    async fn fetch(&mut self, sequence_set: &str, _fields: FetchFields) -> Result<Vec<Message>> {
        let folder = self.selected_folder()?;
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("FETCH {sequence_set}"));
        state.check_failure("FETCH")?;
        Ok(state.messages.get(&folder).cloned().unwrap_or_default())
    }

    async fn uid_fetch(&mut self, uid_set: &str, _fields: FetchFields) -> Result<Vec<Message>> {
        let folder = self.selected_folder()?;
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("UID FETCH {uid_set}"));
        state.check_failure("UID FETCH")?;
        let wanted = parse_set(uid_set);
        Ok(state
            .messages
            .get(&folder)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| wanted.contains(&m.uid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn uid_move(&mut self, uid_set: &str, destination: &str) -> Result<()> {
        let folder = self.selected_folder()?;
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("UID MOVE {uid_set} {destination}"));
        state.check_failure("UID MOVE")?;
        if !state.folders.iter().any(|f| f == destination) {
            return Err(MailError::protocol(
                "UID MOVE",
                Some(destination),
                "no such folder",
            ));
        }
        if state.move_is_noop {
            return Ok(());
        }
        let wanted = parse_set(uid_set);
        let moved = match state.messages.get_mut(&folder) {
            Some(messages) => {
                let (moved, kept) = messages
                    .drain(..)
                    .partition::<Vec<_>, _>(|m| wanted.contains(&m.uid));
                *messages = kept;
                moved
            }
            None => Vec::new(),
        };
        state
            .messages
            .entry(destination.to_string())
            .or_default()
            .extend(moved);
        Ok(())
    }

    async fn uid_copy(&mut self, uid_set: &str, destination: &str) -> Result<()> {
        let folder = self.selected_folder()?;
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("UID COPY {uid_set} {destination}"));
        state.check_failure("UID COPY")?;
        let wanted = parse_set(uid_set);
        let copied: Vec<Message> = state
            .messages
            .get(&folder)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| wanted.contains(&m.uid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        state
            .messages
            .entry(destination.to_string())
            .or_default()
            .extend(copied);
        Ok(())
    }

    async fn uid_store(
        &mut self,
        uid_set: &str,
        operation: FlagOperation,
        flags: &[String],
    ) -> Result<()> {
        let folder = self.selected_folder()?;
        let mut state = self.state.lock().unwrap();
        state
            .log
            .push(format!("UID STORE {uid_set} {} ({})", operation.item(), flags.join(" ")));
        state.check_failure("UID STORE")?;
        let wanted = parse_set(uid_set);
        if let Some(messages) = state.messages.get_mut(&folder) {
            for message in messages.iter_mut().filter(|m| wanted.contains(&m.uid)) {
                match operation {
                    FlagOperation::Add => {
                        for flag in flags {
                            if !message.flags.contains(flag) {
                                message.flags.push(flag.clone());
                            }
                        }
                    }
                    FlagOperation::Remove => message.flags.retain(|f| !flags.contains(f)),
                    FlagOperation::Set => message.flags = flags.to_vec(),
                }
            }
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let folder = self.selected_folder()?;
        let mut state = self.state.lock().unwrap();
        state.log.push("EXPUNGE".to_string());
        state.check_failure("EXPUNGE")?;
        if let Some(messages) = state.messages.get_mut(&folder) {
            messages.retain(|m| !m.flags.iter().any(|f| f == "\\Deleted"));
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push("LOGOUT".to_string());
        Ok(())
    }
}

fn parse_set(set: &str) -> Vec<u32> {
    let mut uids = Vec::new();
    for part in set.split(',').filter(|p| !p.is_empty()) {
        match part.split_once(':') {
            Some((start, end)) => {
                if let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) {
                    uids.extend(start..=end);
                }
            }
            None => {
                if let Ok(uid) = part.parse::<u32>() {
                    uids.push(uid);
                }
            }
        }
    }
    uids
}

/// Builds a minimal message with the given uid and sender address.
pub(crate) fn message(uid: u32, sender: &str) -> Message {
    let (mailbox, host) = sender.split_once('@').unwrap_or((sender, ""));
    Message {
        uid,
        envelope: Envelope {
            from: vec![Address {
                name: None,
                mailbox: mailbox.to_string(),
                host: host.to_string(),
            }],
            ..Envelope::default()
        },
        ..Message::default()
    }
}

/// A throwaway account pointing at the fake server.
pub(crate) fn account() -> Account {
    Account {
        name: "test".to_string(),
        user: "user@example.com".to_string(),
        password: "secret".to_string(),
        server: "imap.example.com".to_string(),
        port: 993,
        use_tls: true,
        purge_on_delete: false,
        is_default: true,
    }
}

/// Like [`account`] but speaking the Gmail dialect.
pub(crate) fn gmail_account() -> Account {
    Account {
        server: "imap.gmail.com".to_string(),
        ..account()
    }
}
