//! Error types for the mail-harvest crate.
//!
//! All errors implement [`std::error::Error`] and carry enough context to
//! diagnose which message and stage failed. Errors are split into two
//! severities - see [`Error::is_fatal`]: fatal errors abort a whole harvest
//! run, non-fatal errors are scoped to a single message and the run
//! continues past them.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while harvesting a mailbox.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Filter / configuration validation (fatal, fails before any network call)
    // ─────────────────────────────────────────────────────────────────────────
    /// An address field of the search filter is not a valid email address.
    #[error("invalid email address for '{field}': {value}")]
    InvalidAddress {
        /// Which filter field was invalid (`from` or `to`).
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A date field of the search filter could not be parsed as `YYYY-MM-DD`.
    #[error("invalid date for '{field}': {value} (expected YYYY-MM-DD)")]
    InvalidDate {
        /// Which filter field was invalid (`after` or `before`).
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The underlying parse error.
        #[source]
        source: chrono::ParseError,
    },

    /// The filter's date range is inconsistent (`after` is later than `before`).
    #[error("inconsistent date range: after {after} is later than before {before}")]
    InvalidDateRange {
        /// The lower bound that was given.
        after: chrono::NaiveDate,
        /// The upper bound that was given.
        before: chrono::NaiveDate,
    },

    /// The filter has no criteria at all.
    #[error("no search criteria provided")]
    EmptyFilter,

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Connection / authentication (fatal)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection.
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect via SOCKS5 proxy.
    #[error("failed to connect via SOCKS5 proxy {proxy_host} to {target}")]
    Socks5Connect {
        /// The SOCKS5 proxy hostname.
        proxy_host: String,
        /// The target address.
        target: String,
        /// The underlying SOCKS5 error.
        #[source]
        source: tokio_socks::Error,
    },

    /// IMAP login was rejected.
    #[error("IMAP login failed for {username}")]
    Login {
        /// The username used for login.
        username: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Folder / search (fatal for the operation requiring them)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to select a folder (typically: it does not exist).
    #[error("failed to select folder '{folder}'")]
    SelectFolder {
        /// The folder name.
        folder: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// The archive folder requested for this run is absent from the server's
    /// folder list. Archiving into a nonexistent folder is a
    /// misconfiguration, so the whole run is refused up front.
    #[error("archive folder '{folder}' does not exist on the server")]
    ArchiveFolderMissing {
        /// The missing folder name.
        folder: String,
    },

    /// The server rejected a UID SEARCH.
    #[error("IMAP search failed for query: {query}")]
    Search {
        /// The search query that was sent.
        query: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to list folders.
    #[error("failed to list IMAP folders")]
    ListFolders {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Per-message operations (non-fatal, the run continues)
    // ─────────────────────────────────────────────────────────────────────────
    /// A UID FETCH command failed outright.
    #[error("IMAP fetch failed for UID {uid}")]
    Fetch {
        /// The UID being fetched.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Reading a message from the fetch stream failed.
    #[error("failed to read fetch result from stream")]
    FetchStream {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// A UID STORE (flag change) failed.
    #[error("failed to store flags on UID {uid}")]
    StoreFlags {
        /// The UID being mutated.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// A UID COPY failed.
    #[error("failed to copy UID {uid} to '{folder}'")]
    Copy {
        /// The UID being copied.
        uid: u32,
        /// The destination folder.
        folder: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// EXPUNGE failed.
    #[error("EXPUNGE failed")]
    Expunge {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// A fetched message could not be parsed.
    #[error("failed to parse message with UID {uid}")]
    ParseMessage {
        /// The UID of the unparseable message.
        uid: u32,
        /// The underlying parse error.
        #[source]
        source: mailparse::MailParseError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence (per-attachment, non-fatal; directory setup is fatal)
    // ─────────────────────────────────────────────────────────────────────────
    /// The download directory could not be created or is not writable.
    #[error("download directory '{path}' is unusable")]
    OutputDir {
        /// The directory that was rejected.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing an attachment to disk failed.
    #[error("failed to save attachment to '{path}'")]
    SaveAttachment {
        /// The destination path of the failed write.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Session teardown
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    Logout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },
}

impl Error {
    /// Returns `true` if this error invalidates the whole harvest run.
    ///
    /// Fatal errors (bad filter, connection/auth failure, rejected search
    /// grammar, missing archive folder) abort the run. Non-fatal errors are
    /// scoped to one message or one attachment; the orchestrator logs them
    /// and moves on to the next handle.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            // Fatal: validation, connection, session-level protocol state
            Error::InvalidAddress { .. }
            | Error::InvalidDate { .. }
            | Error::InvalidDateRange { .. }
            | Error::EmptyFilter
            | Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. }
            | Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::Socks5Connect { .. }
            | Error::Login { .. }
            | Error::SelectFolder { .. }
            | Error::ArchiveFolderMissing { .. }
            | Error::Search { .. }
            | Error::ListFolders { .. }
            | Error::OutputDir { .. }
            | Error::Logout { .. } => true,

            // Scoped to one message or attachment
            Error::Fetch { .. }
            | Error::FetchStream { .. }
            | Error::StoreFlags { .. }
            | Error::Copy { .. }
            | Error::Expunge { .. }
            | Error::ParseMessage { .. }
            | Error::SaveAttachment { .. } => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidAddress { .. }
            | Error::InvalidDate { .. }
            | Error::InvalidDateRange { .. }
            | Error::EmptyFilter
            | Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. } => ErrorCategory::Validation,

            Error::TcpConnect { .. } | Error::TlsConnect { .. } | Error::Socks5Connect { .. } => {
                ErrorCategory::Network
            }

            Error::Login { .. }
            | Error::SelectFolder { .. }
            | Error::ArchiveFolderMissing { .. }
            | Error::Search { .. }
            | Error::ListFolders { .. }
            | Error::Fetch { .. }
            | Error::FetchStream { .. }
            | Error::StoreFlags { .. }
            | Error::Copy { .. }
            | Error::Expunge { .. }
            | Error::Logout { .. } => ErrorCategory::Protocol,

            Error::ParseMessage { .. } => ErrorCategory::Parse,

            Error::OutputDir { .. } | Error::SaveAttachment { .. } => ErrorCategory::Persistence,
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Filter or configuration validation errors.
    Validation,
    /// Network connectivity errors.
    Network,
    /// IMAP protocol errors.
    Protocol,
    /// Message parsing errors.
    Parse,
    /// Disk persistence errors.
    Persistence,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::Persistence => write!(f, "persistence"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        // Validation errors abort the run before any network call
        let err = Error::EmptyFilter;
        assert!(err.is_fatal());

        let err = Error::TcpConnect {
            target: "imap.example.com:993".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.is_fatal());

        // A missing archive folder is a misconfiguration, not a per-message
        // condition
        let err = Error::ArchiveFolderMissing {
            folder: "Archive".into(),
        };
        assert!(err.is_fatal());

        // Disk write failures are scoped to one attachment
        let err = Error::SaveAttachment {
            path: PathBuf::from("/downloads/invoice.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_categories() {
        let err = Error::InvalidAddress {
            field: "from",
            value: "not-an-email".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = Error::Expunge {
            source: async_imap::error::Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "EXPUNGE failed",
            )),
        };
        assert_eq!(err.category(), ErrorCategory::Protocol);

        let err = Error::OutputDir {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.category(), ErrorCategory::Persistence);
    }
}
