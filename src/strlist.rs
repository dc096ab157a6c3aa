//! Ordered lists of strings taken from certificates.
//!
//! Certificate names may carry several values of the same attribute type,
//! say, more than one organizational unit. We keep all of them in the order
//! they appeared in.

use std::{fmt, slice};
use std::borrow::Cow;
use std::iter::FromIterator;
use bytes::Bytes;


//------------ StringList ----------------------------------------------------

/// An ordered list of strings.
///
/// The strings are kept as the octets taken from the certificate which will
/// usually, but not necessarily, be valid UTF-8. Equality and hashing are
/// element-wise and order matters.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct StringList {
    items: Vec<Bytes>,
}

impl StringList {
    /// Creates a new, empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a string to the end of the list.
    pub fn push(&mut self, item: impl Into<Bytes>) {
        self.items.push(item.into())
    }

    /// Returns the number of strings in the list.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the first string if there is one.
    pub fn first(&self) -> Option<&Bytes> {
        self.items.first()
    }

    /// Returns an iterator over the raw strings in order.
    pub fn iter(&self) -> slice::Iter<Bytes> {
        self.items.iter()
    }

    /// Returns an iterator over the strings converted for display.
    ///
    /// Strings that are not valid UTF-8 are converted by treating each
    /// octet as a Latin-1 character.
    pub fn iter_str(&self) -> impl Iterator<Item = Cow<str>> {
        self.items.iter().map(|item| display_str(item))
    }

    /// Returns the sum of the lengths of all strings.
    pub fn total_len(&self) -> usize {
        self.items.iter().map(Bytes::len).sum()
    }
}


//--- FromIterator, IntoIterator

impl<T: Into<Bytes>> FromIterator<T> for StringList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        StringList { items: iter.into_iter().map(Into::into).collect() }
    }
}

impl<'a> IntoIterator for &'a StringList {
    type Item = &'a Bytes;
    type IntoIter = slice::Iter<'a, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}


//--- Debug

impl fmt::Debug for StringList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter_str()).finish()
    }
}


//------------ Helper Functions ----------------------------------------------

/// Converts octets into a string for display.
///
/// Valid UTF-8 is used as is. Anything else is treated as Latin-1 which
/// maps every octet to the Unicode character of the same value.
pub fn display_str(octets: &[u8]) -> Cow<str> {
    match std::str::from_utf8(octets) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(octets.iter().map(|&ch| ch as char).collect()),
    }
}


//============ Tests =========================================================
