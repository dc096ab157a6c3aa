//! Object Identifiers.
//!
//! This is a private module. Its public content is re-exported by the parent.

use std::fmt;
use bytes::Bytes;
use super::content::Constructed;
use super::error::Error;
use super::source::Source;
use super::tag::Tag;


//------------ Oid -----------------------------------------------------------

/// An object identifier in its encoded form.
///
/// Identifiers are compared by their content octets. Known identifiers are
/// kept as constants of type `Oid<&'static [u8]>` which compare equal with
/// decoded values of type `Oid<Bytes>`.
#[derive(Clone, Debug, Hash)]
pub struct Oid<T: AsRef<[u8]>=Bytes>(pub T);

impl Oid<Bytes> {
    /// Takes an OBJECT IDENTIFIER value from the beginning of `cons`.
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_primitive_if(Tag::OID, |prim| prim.take_all().map(Oid))
    }

    /// Takes an optional OBJECT IDENTIFIER value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.take_opt_primitive_if(Tag::OID, |prim| {
            prim.take_all().map(Oid)
        })
    }
}

impl<T: AsRef<[u8]>> Oid<T> {
    /// Returns an iterator over the components of the identifier.
    ///
    /// The first component as encoded combines the first two arcs. It is
    /// returned as is. Fails if the encoding is broken or if a component
    /// doesn’t fit into a `u32`.
    pub fn iter(&self) -> Result<IdIter, Error> {
        let octets = self.0.as_ref();
        if octets.is_empty() {
            xerr!(return Err(Error::Malformed))
        }
        let mut sublen = 0;
        for &ch in octets {
            if ch & 0x80 != 0 {
                sublen += 1;
                if sublen == 1 && ch == 0x80 {
                    xerr!(return Err(Error::Malformed))
                }
                if sublen == 5 {
                    xerr!(return Err(Error::Unimplemented))
                }
            }
            else {
                sublen = 0
            }
        }
        if sublen != 0 {
            xerr!(return Err(Error::Malformed))
        }
        Ok(IdIter(octets))
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Oid<T> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<T: AsRef<[u8]>, U: AsRef<[u8]>> PartialEq<Oid<U>> for Oid<T> {
    fn eq(&self, other: &Oid<U>) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl<T: AsRef<[u8]>> Eq for Oid<T> { }

impl<T: AsRef<[u8]>> fmt::Display for Oid<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut ids = match self.iter() {
            Ok(ids) => ids,
            Err(_) => {
                // Fall back to the raw octets so the value stays
                // recognizable.
                f.write_str("oid:")?;
                for ch in self.0.as_ref() {
                    write!(f, "{:02x}", ch)?;
                }
                return Ok(())
            }
        };
        // The iterator yields at least one item for valid content.
        let first = ids.next().unwrap_or(0);
        if first < 80 {
            write!(f, "{}.{}", first / 40, first % 40)?;
        }
        else {
            write!(f, "2.{}", first - 80)?;
        }
        for id in ids {
            write!(f, ".{}", id)?;
        }
        Ok(())
    }
}


//------------ IdIter --------------------------------------------------------

/// An iterator over the components of an object identifier.
///
/// Only ever created from validated content.
pub struct IdIter<'a>(&'a [u8]);

impl<'a> Iterator for IdIter<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        let mut res = 0u32;
        loop {
            let (&first, tail) = self.0.split_first()?;
            self.0 = tail;
            res = (res << 7) | (first & 0x7f) as u32;
            if first & 0x80 == 0 {
                return Some(res)
            }
        }
    }
}


//============ Tests =========================================================
