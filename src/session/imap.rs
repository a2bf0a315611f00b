//! IMAP session implementation.
//!
//! [`ImapSessionFactory`] dials the account's server (rustls TLS or plain
//! TCP), authenticates, and hands back an exclusive session. Connection,
//! handshake and login failures are fatal; nothing here retries.

use std::fmt;
use std::sync::Arc;

use async_imap::types::{Fetch, Flag};
use async_imap::Session;
use async_trait::async_trait;
use chrono::Utc;
use futures::io::{AsyncRead, AsyncWrite};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::compat::TokioAsyncReadCompatExt;

use crate::domain::{Account, Address, Envelope, Message};
use crate::error::{MailError, Result};

use super::traits::{FetchFields, FlagOperation, FolderStatus, MailSession, SessionFactory};

/// Opens authenticated IMAP sessions over TLS or plain TCP.
#[derive(Debug, Default)]
pub struct ImapSessionFactory;

impl ImapSessionFactory {
    /// Creates a new factory.
    pub fn new() -> Self {
        Self
    }

    async fn connect_tls(&self, account: &Account) -> Result<Box<dyn MailSession>> {
        let tcp_stream = TcpStream::connect(account.address())
            .await
            .map_err(|e| MailError::Connection(format!("TCP connect failed: {e}")))?;

        let config = ClientConfig::builder()
            .with_root_certificates(RootCertStore::from_iter(
                webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
            ))
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(account.server.clone())
            .map_err(|e| MailError::Connection(format!("invalid server name: {e}")))?;

        let tls_stream = connector
            .connect(server_name, tcp_stream)
            .await
            .map_err(|e| MailError::Connection(format!("TLS handshake failed: {e}")))?;

        // Compat wrapper bridges tokio streams to the futures traits
        // async-imap expects.
        login(account, tls_stream.compat()).await
    }

    async fn connect_plain(&self, account: &Account) -> Result<Box<dyn MailSession>> {
        let tcp_stream = TcpStream::connect(account.address())
            .await
            .map_err(|e| MailError::Connection(format!("TCP connect failed: {e}")))?;
        login(account, tcp_stream.compat()).await
    }
}

#[async_trait]
impl SessionFactory for ImapSessionFactory {
    async fn open(&self, account: &Account) -> Result<Box<dyn MailSession>> {
        if account.use_tls {
            self.connect_tls(account).await
        } else {
            self.connect_plain(account).await
        }
    }
}

async fn login<S>(account: &Account, stream: S) -> Result<Box<dyn MailSession>>
where
    S: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send + 'static,
{
    let client = async_imap::Client::new(stream);
    let session = client
        .login(&account.user, &account.password)
        .await
        .map_err(|(e, _)| MailError::Connection(format!("login failed: {e}")))?;

    tracing::debug!(account = %account.name, server = %account.server, "session authenticated");
    Ok(Box::new(ImapMailSession { session }))
}

/// A [`MailSession`] over one async-imap session, generic over the underlying
/// stream so TLS and plaintext connections share the implementation.
struct ImapMailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send,
{
    session: Session<S>,
}

#[async_trait]
impl<S> MailSession for ImapMailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send,
{
    async fn select(&mut self, folder: &str, read_only: bool) -> Result<FolderStatus> {
        let mailbox = if read_only {
            self.session
                .examine(folder)
                .await
                .map_err(|e| MailError::protocol("EXAMINE", Some(folder), e))?
        } else {
            self.session
                .select(folder)
                .await
                .map_err(|e| MailError::protocol("SELECT", Some(folder), e))?
        };
        Ok(FolderStatus {
            exists: mailbox.exists,
        })
    }

    async fn capabilities(&mut self) -> Result<Vec<String>> {
        let caps = self
            .session
            .capabilities()
            .await
            .map_err(|e| MailError::protocol("CAPABILITY", None, e))?;
        Ok(caps.iter().map(|c| format!("{c:?}")).collect())
    }

    async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        {
            let mut stream = self
                .session
                .list(Some(reference), Some(pattern))
                .await
                .map_err(|e| MailError::protocol("LIST", None, e))?;
            while let Some(name) = stream.next().await {
                let name = name.map_err(|e| MailError::protocol("LIST", None, e))?;
                names.push(name.name().to_string());
            }
        }
        Ok(names)
    }

    async fn create(&mut self, folder: &str) -> Result<()> {
        self.session
            .create(folder)
            .await
            .map_err(|e| MailError::protocol("CREATE", Some(folder), e))
    }

    async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        let uids = self
            .session
            .uid_search(query)
            .await
            .map_err(|e| MailError::protocol("UID SEARCH", None, e))?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch(&mut self, sequence_set: &str, fields: FetchFields) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        {
            let mut stream = self
                .session
                .fetch(sequence_set, &fields.item_spec())
                .await
                .map_err(|e| MailError::protocol("FETCH", None, e))?;
            while let Some(fetch) = stream.next().await {
                let fetch = fetch.map_err(|e| MailError::protocol("FETCH", None, e))?;
                messages.push(to_message(&fetch));
            }
        }
        Ok(messages)
    }

    async fn uid_fetch(&mut self, uid_set: &str, fields: FetchFields) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        {
            let mut stream = self
                .session
                .uid_fetch(uid_set, &fields.item_spec())
                .await
                .map_err(|e| MailError::protocol("UID FETCH", None, e))?;
            while let Some(fetch) = stream.next().await {
                let fetch = fetch.map_err(|e| MailError::protocol("UID FETCH", None, e))?;
                messages.push(to_message(&fetch));
            }
        }
        Ok(messages)
    }

    async fn uid_move(&mut self, uid_set: &str, destination: &str) -> Result<()> {
        self.session
            .uid_mv(uid_set, destination)
            .await
            .map_err(|e| MailError::protocol("UID MOVE", Some(destination), e))
    }

    async fn uid_copy(&mut self, uid_set: &str, destination: &str) -> Result<()> {
        self.session
            .uid_copy(uid_set, destination)
            .await
            .map_err(|e| MailError::protocol("UID COPY", Some(destination), e))
    }

    async fn uid_store(
        &mut self,
        uid_set: &str,
        operation: FlagOperation,
        flags: &[String],
    ) -> Result<()> {
        let query = format!("{} ({})", operation.item(), flags.join(" "));
        {
            let stream = self
                .session
                .uid_store(uid_set, &query)
                .await
                .map_err(|e| MailError::protocol("UID STORE", None, e))?;
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                item.map_err(|e| MailError::protocol("UID STORE", None, e))?;
            }
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        {
            let stream = self
                .session
                .expunge()
                .await
                .map_err(|e| MailError::protocol("EXPUNGE", None, e))?;
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                item.map_err(|e| MailError::protocol("EXPUNGE", None, e))?;
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| MailError::protocol("LOGOUT", None, e))
    }
}

fn to_message(fetch: &Fetch) -> Message {
    Message {
        sequence_number: fetch.message,
        uid: fetch.uid.unwrap_or_default(),
        envelope: fetch.envelope().map(to_envelope).unwrap_or_default(),
        internal_date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
        flags: fetch.flags().map(|f| flag_name(&f)).collect(),
        size: fetch.size,
    }
}

fn to_envelope(envelope: &async_imap::imap_proto::types::Envelope<'_>) -> Envelope {
    Envelope {
        from: envelope
            .from
            .as_deref()
            .map(to_addresses)
            .unwrap_or_default(),
        to: envelope.to.as_deref().map(to_addresses).unwrap_or_default(),
        subject: envelope
            .subject
            .as_ref()
            .map(|s| String::from_utf8_lossy(s).to_string()),
    }
}

fn to_addresses(addresses: &[async_imap::imap_proto::types::Address<'_>]) -> Vec<Address> {
    addresses
        .iter()
        .map(|addr| Address {
            name: addr
                .name
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string()),
            mailbox: addr
                .mailbox
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default(),
            host: addr
                .host
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default(),
        })
        .collect()
}

fn flag_name(flag: &Flag<'_>) -> String {
    match flag {
        Flag::Seen => "\\Seen".to_string(),
        Flag::Answered => "\\Answered".to_string(),
        Flag::Flagged => "\\Flagged".to_string(),
        Flag::Deleted => "\\Deleted".to_string(),
        Flag::Draft => "\\Draft".to_string(),
        Flag::Recent => "\\Recent".to_string(),
        Flag::MayCreate => "\\*".to_string(),
        Flag::Custom(name) => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_names_round_trip_system_flags() {
        assert_eq!(flag_name(&Flag::Seen), "\\Seen");
        assert_eq!(flag_name(&Flag::Deleted), "\\Deleted");
        assert_eq!(flag_name(&Flag::Custom("$Junk".into())), "$Junk");
    }
}
