//! Turns a [`SearchFilter`] into an ordered IMAP search-term sequence.
//!
//! Term order is fixed (FROM, TO, SINCE, BEFORE, SUBJECT, UNSEEN): some
//! servers are sensitive to it, and a deterministic order keeps the emitted
//! query testable. The terms are logically a conjunction.

use crate::filter::SearchFilter;
use chrono::NaiveDate;
use std::fmt;

/// IMAP date literal format, e.g. `10-Jan-2024`.
const IMAP_DATE_FORMAT: &str = "%d-%b-%Y";

/// One protocol search atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    /// `FROM "<address>"`
    From(String),
    /// `TO "<address>"`
    To(String),
    /// `SINCE <date>`
    Since(NaiveDate),
    /// `BEFORE <date>`
    Before(NaiveDate),
    /// `SUBJECT "<substring>"`
    Subject(String),
    /// `UNSEEN`
    Unseen,
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTerm::From(address) => write!(f, "FROM \"{address}\""),
            SearchTerm::To(address) => write!(f, "TO \"{address}\""),
            SearchTerm::Since(date) => write!(f, "SINCE {}", date.format(IMAP_DATE_FORMAT)),
            SearchTerm::Before(date) => write!(f, "BEFORE {}", date.format(IMAP_DATE_FORMAT)),
            SearchTerm::Subject(text) => write!(f, "SUBJECT \"{text}\""),
            SearchTerm::Unseen => write!(f, "UNSEEN"),
        }
    }
}

/// An ordered sequence of search atoms, ready to be sent as `UID SEARCH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTermSequence {
    terms: Vec<SearchTerm>,
}

impl SearchTermSequence {
    /// Returns the terms in protocol order.
    #[must_use]
    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// Returns the number of atoms in the sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns `true` if the sequence holds no atoms.
    ///
    /// Cannot happen for a sequence built from a validated filter, which
    /// always carries at least one criterion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for SearchTermSequence {
    /// Renders the full query string, atoms separated by single spaces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for term in &self.terms {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{term}")?;
            first = false;
        }
        Ok(())
    }
}

/// Builds the term sequence for a validated filter.
///
/// Pure: no I/O, no side effects. The filter's invariants (at least one
/// criterion, consistent dates, valid addresses) are already guaranteed by
/// [`SearchFilter`] construction.
#[must_use]
pub fn build(filter: &SearchFilter) -> SearchTermSequence {
    let mut terms = Vec::new();

    if let Some(address) = &filter.from_address {
        terms.push(SearchTerm::From(address.to_string()));
    }
    if let Some(address) = &filter.to_address {
        terms.push(SearchTerm::To(address.to_string()));
    }
    if let Some(date) = filter.after {
        terms.push(SearchTerm::Since(date));
    }
    if let Some(date) = filter.before {
        terms.push(SearchTerm::Before(date));
    }
    if let Some(subject) = &filter.subject_contains {
        terms.push(SearchTerm::Subject(subject.clone()));
    }
    if filter.unread_only {
        terms.push(SearchTerm::Unseen);
    }

    SearchTermSequence { terms }
}
