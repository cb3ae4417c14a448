//! IMAP mailbox session: one authenticated TLS connection plus the
//! currently selected folder.
//!
//! [`MailboxSession`] exposes exactly the protocol subset the pipeline
//! needs (UID SEARCH/FETCH/STORE/COPY, EXPUNGE, LIST, SELECT, LOGOUT). The
//! primitive surface is lifted into the [`Mailbox`] trait so the archive
//! coordinator and the orchestrator can be exercised against a scripted
//! in-memory mailbox in tests.
//!
//! Folder selection is connection-global state: every operation that
//! depends on the current folder must select the folder it needs
//! immediately before use, because a prior step (such as archive
//! verification) may have changed it.

use crate::config::HarvestConfig;
use crate::connection::{self, TlsStream};
use crate::criteria::SearchTermSequence;
use crate::error::{Error, Result};
use crate::message::FetchedMessage;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Server-assigned message UID, stable across folder operations while the
/// assigning folder stays selected.
pub type Uid = u32;

/// Type alias for the underlying IMAP session over TLS.
type ImapSession = async_imap::Session<TlsStream>;

/// The mailbox primitives consumed by the coordinator and orchestrator.
///
/// [`MailboxSession`] is the production implementation; tests drive the
/// same code paths through a scripted double.
#[async_trait]
pub trait Mailbox {
    /// Runs `UID SEARCH` with the given terms in the currently selected
    /// folder. UIDs are returned in ascending order.
    async fn search(&mut self, terms: &SearchTermSequence) -> Result<Vec<Uid>>;

    /// Fetches and parses one message by UID.
    ///
    /// Returns `Ok(None)` - not an error - when the message disappeared
    /// between search and fetch (raced by concurrent external mutation).
    async fn fetch(&mut self, uid: Uid) -> Result<Option<FetchedMessage>>;

    /// Marks a message `\Seen`.
    async fn mark_seen(&mut self, uid: Uid) -> Result<()>;

    /// Copies a message into another folder (`UID COPY`).
    async fn copy_to(&mut self, uid: Uid, folder: &str) -> Result<()>;

    /// Selects a folder; fails when it does not exist.
    async fn select(&mut self, folder: &str) -> Result<()>;

    /// Runs `UID SEARCH HEADER <name> "<value>"` scoped to the currently
    /// selected folder. Used for post-copy verification.
    async fn search_header(&mut self, name: &str, value: &str) -> Result<Vec<Uid>>;

    /// Marks a message `\Deleted` and immediately expunges. Irreversible.
    async fn mark_deleted_and_expunge(&mut self, uid: Uid) -> Result<()>;

    /// Lists all folder names known to the server.
    async fn list_folders(&mut self) -> Result<HashSet<String>>;

    /// Returns `true` when `name` appears in the server's folder list.
    async fn folder_exists(&mut self, name: &str) -> Result<bool> {
        Ok(self.list_folders().await?.contains(name))
    }

    /// Logs out. Safe to call once at end of session regardless of prior
    /// errors.
    async fn logout(&mut self) -> Result<()>;
}

/// One live, authenticated IMAP session.
///
/// Created by [`MailboxSession::connect`]; destroyed by
/// [`logout`](Mailbox::logout), which the orchestrator runs on every exit
/// path.
pub struct MailboxSession {
    session: Box<ImapSession>,
    current_folder: String,
}

impl MailboxSession {
    /// Connects, authenticates, and selects the configured inbox folder.
    ///
    /// # Errors
    ///
    /// Returns a connection-class error ([`Error::TcpConnect`],
    /// [`Error::TlsConnect`], [`Error::Socks5Connect`]) when the transport
    /// cannot be established, [`Error::Login`] when authentication is
    /// rejected, and [`Error::SelectFolder`] when the initial folder cannot
    /// be selected.
    #[instrument(
        name = "MailboxSession::connect",
        skip_all,
        fields(
            host = %config.host,
            username = %config.username(),
            folder = %config.folders.inbox,
            proxy_enabled = config.proxy.is_some()
        )
    )]
    pub async fn connect(config: &HarvestConfig) -> Result<Self> {
        let target_addr = config.server_address();
        let tls_stream = connection::establish_tls_connection(
            &config.host,
            &target_addr,
            config.proxy.as_ref(),
        )
        .await?;

        debug!("TLS connection established");

        let client = async_imap::Client::new(tls_stream);
        let mut session = client
            .login(config.username(), config.password())
            .await
            .map_err(|e| Error::Login {
                username: config.username().to_string(),
                source: e.0,
            })?;

        debug!("Authenticated");

        let inbox = config.folders.inbox.clone();
        session
            .select(&inbox)
            .await
            .map_err(|source| Error::SelectFolder {
                folder: inbox.clone(),
                source,
            })?;

        debug!(folder = %inbox, "Selected initial folder");

        Ok(Self {
            session: Box::new(session),
            current_folder: inbox,
        })
    }

    /// Returns the name of the currently selected folder.
    #[must_use]
    pub fn current_folder(&self) -> &str {
        &self.current_folder
    }
}

#[async_trait]
impl Mailbox for MailboxSession {
    #[instrument(name = "session::search", skip_all, fields(terms = terms.len()))]
    async fn search(&mut self, terms: &SearchTermSequence) -> Result<Vec<Uid>> {
        let query = terms.to_string();
        debug!(query = %query, "UID SEARCH");

        let uids = self
            .session
            .uid_search(&query)
            .await
            .map_err(|source| Error::Search {
                query: query.clone(),
                source,
            })?;

        let mut uids: Vec<Uid> = uids.into_iter().collect();
        uids.sort_unstable();

        debug!(matched = uids.len(), "Search complete");

        Ok(uids)
    }

    #[instrument(name = "session::fetch", skip(self))]
    async fn fetch(&mut self, uid: Uid) -> Result<Option<FetchedMessage>> {
        let raw = {
            let mut stream = self
                .session
                .uid_fetch(uid.to_string(), "BODY[]")
                .await
                .map_err(|source| Error::Fetch { uid, source })?;

            let mut raw: Option<Vec<u8>> = None;
            while let Some(item) = stream.next().await {
                let fetch = item.map_err(|source| Error::FetchStream { source })?;
                if raw.is_none() {
                    raw = fetch.body().map(<[u8]>::to_vec);
                }
            }
            raw
        };

        match raw {
            Some(bytes) => Ok(Some(FetchedMessage::parse(uid, &bytes)?)),
            None => {
                warn!(uid, "Message not found on fetch, likely deleted concurrently");
                Ok(None)
            }
        }
    }

    #[instrument(name = "session::mark_seen", skip(self))]
    async fn mark_seen(&mut self, uid: Uid) -> Result<()> {
        let stream = self
            .session
            .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
            .await
            .map_err(|source| Error::StoreFlags { uid, source })?;
        drain_stream(stream)
            .await
            .map_err(|source| Error::StoreFlags { uid, source })
    }

    #[instrument(name = "session::copy_to", skip(self))]
    async fn copy_to(&mut self, uid: Uid, folder: &str) -> Result<()> {
        self.session
            .uid_copy(uid.to_string(), folder)
            .await
            .map_err(|source| Error::Copy {
                uid,
                folder: folder.to_string(),
                source,
            })
    }

    #[instrument(name = "session::select", skip(self))]
    async fn select(&mut self, folder: &str) -> Result<()> {
        self.session
            .select(folder)
            .await
            .map_err(|source| Error::SelectFolder {
                folder: folder.to_string(),
                source,
            })?;

        self.current_folder = folder.to_string();
        Ok(())
    }

    #[instrument(name = "session::search_header", skip(self, value))]
    async fn search_header(&mut self, name: &str, value: &str) -> Result<Vec<Uid>> {
        let query = header_query(name, value);

        let uids = self
            .session
            .uid_search(&query)
            .await
            .map_err(|source| Error::Search {
                query: query.clone(),
                source,
            })?;

        let mut uids: Vec<Uid> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    #[instrument(name = "session::mark_deleted_and_expunge", skip(self))]
    async fn mark_deleted_and_expunge(&mut self, uid: Uid) -> Result<()> {
        let store_stream = self
            .session
            .uid_store(uid.to_string(), "+FLAGS (\\Deleted)")
            .await
            .map_err(|source| Error::StoreFlags { uid, source })?;
        drain_stream(store_stream)
            .await
            .map_err(|source| Error::StoreFlags { uid, source })?;

        let expunge_stream = self
            .session
            .expunge()
            .await
            .map_err(|source| Error::Expunge { source })?;
        drain_stream(expunge_stream)
            .await
            .map_err(|source| Error::Expunge { source })
    }

    #[instrument(name = "session::list_folders", skip(self))]
    async fn list_folders(&mut self) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        {
            let mut stream = self
                .session
                .list(Some(""), Some("*"))
                .await
                .map_err(|source| Error::ListFolders { source })?;

            while let Some(item) = stream.next().await {
                let name = item.map_err(|source| Error::ListFolders { source })?;
                names.insert(normalize_folder_name(name.name()));
            }
        }

        debug!(count = names.len(), "Listed folders");

        Ok(names)
    }

    #[instrument(name = "session::logout", skip(self))]
    async fn logout(&mut self) -> Result<()> {
        debug!("Logging out");

        self.session
            .logout()
            .await
            .map_err(|source| Error::Logout { source })
    }
}

impl std::fmt::Debug for MailboxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxSession")
            .field("current_folder", &self.current_folder)
            .finish_non_exhaustive()
    }
}

/// Consumes a protocol response stream to completion.
async fn drain_stream<T, E>(
    stream: impl futures::Stream<Item = std::result::Result<T, E>>,
) -> std::result::Result<(), E> {
    futures::pin_mut!(stream);
    while let Some(result) = stream.next().await {
        result?;
    }
    Ok(())
}

/// Builds a `HEADER` search query with a quoted, grammar-safe value.
fn header_query(name: &str, value: &str) -> String {
    let safe: String = value
        .chars()
        .filter(|c| *c != '"' && *c != '\r' && *c != '\n')
        .collect();
    format!("HEADER {name} \"{safe}\"")
}

/// Strips surrounding quotes some servers leave on listed folder names.
fn normalize_folder_name(name: &str) -> String {
    name.trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_query_quoting() {
        assert_eq!(
            header_query("Message-ID", "<abc@example.com>"),
            "HEADER Message-ID \"<abc@example.com>\""
        );
        // Embedded quotes and CRLF must not break the query grammar
        assert_eq!(
            header_query("Message-ID", "<a\"b>\r\n"),
            "HEADER Message-ID \"<ab>\""
        );
    }

    #[test]
    fn test_normalize_folder_name() {
        assert_eq!(normalize_folder_name("\"Archive\""), "Archive");
        assert_eq!(normalize_folder_name("INBOX"), "INBOX");
        assert_eq!(normalize_folder_name("\"My Folder\""), "My Folder");
    }
}
