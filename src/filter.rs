//! Search filter: a validated description of which messages to find.
//!
//! A [`SearchFilter`] is built once, validated at build time, and then
//! consumed by [`criteria::build`](crate::criteria::build) to produce the
//! protocol search terms. Construction merges configuration defaults under
//! caller overrides - an override wins only when it is actually set:
//!
//! ```
//! use mail_harvest::config::SearchDefaults;
//! use mail_harvest::SearchFilter;
//!
//! let defaults = SearchDefaults {
//!     from: Some("billing@utility.example".into()),
//!     unread: true,
//!     ..SearchDefaults::default()
//! };
//!
//! let filter = SearchFilter::builder()
//!     .subject("Invoice")          // per-run override
//!     .defaults(&defaults)         // fills only unset fields
//!     .build()
//!     .expect("valid filter");
//!
//! assert!(filter.unread_only);
//! assert_eq!(filter.subject_contains.as_deref(), Some("Invoice"));
//! ```

use crate::config::SearchDefaults;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use email_address::EmailAddress;

/// Date format accepted for the `after`/`before` bounds.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A normalized, validated search request.
///
/// Invariants (enforced by [`SearchFilterBuilder::build`]):
/// at least one field is set; when both dates are present,
/// `after <= before`; address fields are valid email addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    /// Sender address to match (`FROM`).
    pub from_address: Option<EmailAddress>,
    /// Recipient address to match (`TO`).
    pub to_address: Option<EmailAddress>,
    /// Subject substring to match (`SUBJECT`).
    pub subject_contains: Option<String>,
    /// Lower date bound (`SINCE`).
    pub after: Option<NaiveDate>,
    /// Upper date bound (`BEFORE`).
    pub before: Option<NaiveDate>,
    /// Match only unread messages (`UNSEEN`).
    pub unread_only: bool,
}

impl SearchFilter {
    /// Creates a new filter builder.
    #[must_use]
    pub fn builder() -> SearchFilterBuilder {
        SearchFilterBuilder::default()
    }
}

/// Builder for [`SearchFilter`].
///
/// Field setters take raw strings; everything is validated in one place by
/// [`build`](Self::build), which fails closed on the first problem.
#[derive(Debug, Default, Clone)]
pub struct SearchFilterBuilder {
    from: Option<String>,
    to: Option<String>,
    subject: Option<String>,
    after: Option<String>,
    before: Option<String>,
    unread: Option<bool>,
}

impl SearchFilterBuilder {
    /// Sets the sender address to match.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Sets the recipient address to match.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to = Some(address.into());
        self
    }

    /// Sets the subject substring to match.
    #[must_use]
    pub fn subject(mut self, substring: impl Into<String>) -> Self {
        self.subject = Some(substring.into());
        self
    }

    /// Sets the lower date bound, `YYYY-MM-DD`.
    #[must_use]
    pub fn after(mut self, date: impl Into<String>) -> Self {
        self.after = Some(date.into());
        self
    }

    /// Sets the upper date bound, `YYYY-MM-DD`.
    #[must_use]
    pub fn before(mut self, date: impl Into<String>) -> Self {
        self.before = Some(date.into());
        self
    }

    /// Restricts matching to unread messages.
    #[must_use]
    pub fn unread_only(mut self, unread: bool) -> Self {
        self.unread = Some(unread);
        self
    }

    /// Fills every still-unset field from the configuration defaults.
    ///
    /// Call this after the per-run setters: a value set on the builder wins
    /// over the default, a default only applies where the builder has
    /// nothing.
    #[must_use]
    pub fn defaults(mut self, defaults: &SearchDefaults) -> Self {
        if self.from.is_none() {
            self.from.clone_from(&defaults.from);
        }
        if self.to.is_none() {
            self.to.clone_from(&defaults.to);
        }
        if self.subject.is_none() {
            self.subject.clone_from(&defaults.subject);
        }
        if self.after.is_none() {
            self.after.clone_from(&defaults.after);
        }
        if self.before.is_none() {
            self.before.clone_from(&defaults.before);
        }
        if self.unread.is_none() && defaults.unread {
            self.unread = Some(true);
        }
        self
    }

    /// Validates and builds the filter.
    ///
    /// # Errors
    ///
    /// Each failure is distinct so callers can report precisely:
    ///
    /// - [`Error::InvalidAddress`] - an address field is not `local@domain.tld`;
    /// - [`Error::InvalidDate`] - a date field is not `YYYY-MM-DD`;
    /// - [`Error::InvalidDateRange`] - `after` is later than `before`;
    /// - [`Error::EmptyFilter`] - nothing at all is set.
    pub fn build(self) -> Result<SearchFilter> {
        let from_address = self
            .from
            .as_deref()
            .map(|raw| parse_address("from", raw))
            .transpose()?;
        let to_address = self
            .to
            .as_deref()
            .map(|raw| parse_address("to", raw))
            .transpose()?;

        let after = self
            .after
            .as_deref()
            .map(|raw| parse_date("after", raw))
            .transpose()?;
        let before = self
            .before
            .as_deref()
            .map(|raw| parse_date("before", raw))
            .transpose()?;

        if let (Some(after), Some(before)) = (after, before) {
            if after > before {
                return Err(Error::InvalidDateRange { after, before });
            }
        }

        let unread_only = self.unread.unwrap_or(false);

        let filter = SearchFilter {
            from_address,
            to_address,
            subject_contains: self.subject,
            after,
            before,
            unread_only,
        };

        if filter.from_address.is_none()
            && filter.to_address.is_none()
            && filter.subject_contains.is_none()
            && filter.after.is_none()
            && filter.before.is_none()
            && !filter.unread_only
        {
            return Err(Error::EmptyFilter);
        }

        Ok(filter)
    }
}

fn parse_address(field: &'static str, raw: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(raw, email_address::Options::default()).map_err(|_| {
        Error::InvalidAddress {
            field,
            value: raw.to_string(),
        }
    })
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|source| Error::InvalidDate {
        field,
        value: raw.to_string(),
        source,
    })
}
