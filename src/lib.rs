//! # mail-harvest
//!
//! Async IMAP client for harvesting email attachments, with a verified
//! archive-and-delete sequence that never loses a message.
//!
//! This crate provides a high-level, async API for:
//! - Building validated IMAP search filters (sender, recipient, subject,
//!   date range, unread)
//! - Fetching matching messages and extracting their attachments to disk
//! - Optionally marking processed messages read and archiving them with a
//!   copy-then-verify-then-delete state machine
//!
//! ## Features
//!
//! - **`observability`**: Enables OpenTelemetry integration for distributed
//!   tracing. Without this feature, tracing spans are still emitted but
//!   require no OTEL dependencies.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mail_harvest::{HarvestConfig, HarvestOptions, Harvester, SearchFilter};
//!
//! # async fn example() -> mail_harvest::Result<()> {
//! // Configure the mailbox and download directory
//! let config = HarvestConfig::builder()
//!     .host("imap.example.com")
//!     .username("bills@example.com")
//!     .password("app-password")  // Use app-specific password for Gmail
//!     .download_dir("/home/me/attachments")
//!     .build()?;
//!
//! // Describe which messages to harvest
//! let filter = SearchFilter::builder()
//!     .from("billing@utility.example")
//!     .after("2024-01-01")
//!     .unread_only(true)
//!     .defaults(&config.search)
//!     .build()?;
//!
//! // Run the pipeline
//! let summary = Harvester::new(config)
//!     .run(&filter, HarvestOptions { mark_read: true, archive: true })
//!     .await?;
//!
//! println!("saved {} attachments", summary.attachments_saved);
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety of the archive step
//!
//! Archiving is copy-then-verify-then-delete: the source message is deleted
//! only after a `Message-ID` search proves the copy exists in the archive
//! folder. A failed copy or verification leaves the source message in
//! place (flagged `\Seen` at most) and is reported through
//! [`ArchiveOutcome`], a value, not an error.
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. Use
//! [`Error::is_fatal`] to distinguish run-aborting failures from
//! per-message ones:
//!
//! ```
//! use mail_harvest::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_fatal() {
//!         eprintln!("run aborted: {error}");
//!     } else {
//!         eprintln!("one message skipped: {error}");
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation; no subscriber is installed
//! by the library. All major operations emit spans with structured fields.
//!
//! ### Span Naming Convention
//!
//! - `Harvester::run` - One end-to-end harvest
//! - `MailboxSession::connect` - Connection and authentication
//! - `session::*` - Individual IMAP commands
//! - `archive::archive_message` - Verified archive of one message
//! - `connection::establish_tls` - TLS connection
//!
//! ### Standard Fields
//!
//! - `host` - IMAP server hostname
//! - `username` - Login name
//! - `folder` - Folder being operated on
//! - `uid` - Message UID
//! - `matched` / `saved` / `archived` / `failed` - Run counters
//!
//! Enable the `observability` feature for OpenTelemetry integration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod archive;
pub mod config;
pub mod criteria;
pub mod error;
pub mod extract;
pub mod filter;
pub mod harvest;
pub mod message;
pub mod proxy;
pub mod session;
pub mod store;

// Internal modules
mod connection;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for ergonomic API
pub use archive::ArchiveOutcome;
pub use config::{FolderConfig, HarvestConfig, HarvestConfigBuilder, SearchDefaults};
pub use email_address::EmailAddress;
pub use error::{Error, ErrorCategory, Result};
pub use extract::Attachment;
pub use filter::{SearchFilter, SearchFilterBuilder};
pub use harvest::{HarvestOptions, HarvestSummary, Harvester};
pub use message::FetchedMessage;
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use session::{Mailbox, MailboxSession, Uid};
pub use store::AttachmentStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        // Ensure all public types are accessible
        let _ = HarvestConfig::builder();
        let _ = SearchFilter::builder();
        let _ = Socks5Proxy::new("localhost", 1080);
    }
}
