//! Configuration for a harvest run.
//!
//! Use [`HarvestConfigBuilder`] to assemble a validated configuration:
//!
//! ```
//! use mail_harvest::HarvestConfig;
//!
//! let config = HarvestConfig::builder()
//!     .host("imap.example.com")
//!     .username("bills@example.com")
//!     .password("app-password")
//!     .download_dir("/home/me/attachments")
//!     .build()
//!     .expect("valid config");
//! ```
//!
//! The configuration is consumed by the crate, not owned by it: how the
//! values are obtained (JSON file, CLI flags, environment) is the embedding
//! binary's business. Search defaults live here too and are merged under
//! per-run overrides by
//! [`SearchFilterBuilder::defaults`](crate::filter::SearchFilterBuilder::defaults).

use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};

/// Configuration for connecting to a mailbox and harvesting attachments.
///
/// Create using [`HarvestConfig::builder()`].
///
/// The `password` field is stored as a [`SecretString`] so that it cannot
/// leak through `Debug` output; the `username` is a validated
/// [`EmailAddress`].
#[derive(Clone)]
pub struct HarvestConfig {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port (default: 993 for IMAPS).
    pub port: u16,
    /// Login name, validated as an email address.
    username: EmailAddress,
    /// Login password or app-specific password.
    password: SecretString,
    /// Folder names used by the pipeline.
    pub folders: FolderConfig,
    /// Default search criteria, merged under per-run overrides.
    pub search: SearchDefaults,
    /// Directory attachments are written to.
    pub download_dir: PathBuf,
    /// Optional SOCKS5 proxy for the connection.
    pub proxy: Option<Socks5Proxy>,
}

impl std::fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username.as_str())
            .field("password", &"[REDACTED]")
            .field("folders", &self.folders)
            .field("search", &self.search)
            .field("download_dir", &self.download_dir)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl HarvestConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::default()
    }

    /// Returns the login name as a string slice.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the password as a string slice.
    ///
    /// The password is intentionally not a public field so it cannot be
    /// logged by accident; call this only to pass it to authentication.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Folder names used by the harvesting pipeline.
#[derive(Debug, Clone)]
pub struct FolderConfig {
    /// Folder searched for matching messages.
    pub inbox: String,
    /// Folder archived messages are copied into.
    pub archive: String,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            inbox: "INBOX".to_string(),
            archive: "Archive".to_string(),
        }
    }
}

/// Default search criteria carried in the configuration.
///
/// Every field is optional; a per-run override wins whenever it is set.
/// These are raw, unvalidated strings - validation happens when the merged
/// [`SearchFilter`](crate::filter::SearchFilter) is built.
#[derive(Debug, Clone, Default)]
pub struct SearchDefaults {
    /// Sender address to match (`FROM`).
    pub from: Option<String>,
    /// Recipient address to match (`TO`).
    pub to: Option<String>,
    /// Subject substring to match (`SUBJECT`).
    pub subject: Option<String>,
    /// Lower date bound, `YYYY-MM-DD` (`SINCE`).
    pub after: Option<String>,
    /// Upper date bound, `YYYY-MM-DD` (`BEFORE`).
    pub before: Option<String>,
    /// Match only unread messages (`UNSEEN`).
    pub unread: bool,
}

/// Builder for [`HarvestConfig`].
#[derive(Debug, Default)]
pub struct HarvestConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    folders: Option<FolderConfig>,
    search: Option<SearchDefaults>,
    download_dir: Option<PathBuf>,
    proxy: Option<Socks5Proxy>,
}

impl HarvestConfigBuilder {
    /// Sets the IMAP server hostname (required).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the IMAP server port.
    ///
    /// Default is 993 (IMAPS with TLS).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the login name (required). Must be a valid email address.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password (required).
    ///
    /// For Gmail/Outlook, use an app-specific password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the folder names used by the pipeline.
    ///
    /// Defaults to `INBOX` / `Archive`.
    #[must_use]
    pub fn folders(mut self, folders: FolderConfig) -> Self {
        self.folders = Some(folders);
        self
    }

    /// Sets the inbox folder name.
    #[must_use]
    pub fn inbox_folder(mut self, name: impl Into<String>) -> Self {
        self.folders.get_or_insert_with(FolderConfig::default).inbox = name.into();
        self
    }

    /// Sets the archive folder name.
    #[must_use]
    pub fn archive_folder(mut self, name: impl Into<String>) -> Self {
        self.folders
            .get_or_insert_with(FolderConfig::default)
            .archive = name.into();
        self
    }

    /// Sets the default search criteria.
    #[must_use]
    pub fn search_defaults(mut self, search: SearchDefaults) -> Self {
        self.search = Some(search);
        self
    }

    /// Sets the directory attachments are written to (required).
    #[must_use]
    pub fn download_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.download_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sets a SOCKS5 proxy for the connection.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a required field is missing and
    /// [`Error::InvalidAddress`] if the username is not a valid email
    /// address.
    pub fn build(self) -> Result<HarvestConfig> {
        let host = self.host.ok_or_else(|| Error::InvalidConfig {
            message: "host is required".into(),
        })?;

        let username_raw = self.username.ok_or_else(|| Error::InvalidConfig {
            message: "username is required".into(),
        })?;

        let username =
            EmailAddress::parse_with_options(&username_raw, email_address::Options::default())
                .map_err(|_| Error::InvalidAddress {
                    field: "username",
                    value: username_raw.clone(),
                })?;

        let password_raw = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;

        let download_dir = self.download_dir.ok_or_else(|| Error::InvalidConfig {
            message: "download_dir is required".into(),
        })?;

        Ok(HarvestConfig {
            host,
            port: self.port.unwrap_or(993),
            username,
            password: SecretString::from(password_raw),
            folders: self.folders.unwrap_or_default(),
            search: self.search.unwrap_or_default(),
            download_dir,
            proxy: self.proxy,
        })
    }
}
