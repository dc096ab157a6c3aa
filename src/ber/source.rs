//! Access to the octets being decoded.
//!
//! This is a private module. Its public content is being re-exported by the
//! parent module.

use std::cmp::min;
use bytes::{Buf, Bytes};
use super::error::Error;


//------------ Source --------------------------------------------------------

/// A view into a sequence of octets.
///
/// A source can only progress forward. It provides access to the next few
/// octets as a slice, allows advancing over them, and can hand out a
/// `Bytes` value for a range of them.
pub trait Source {
    /// The error produced by the source.
    ///
    /// The type used here needs to wrap `ber::Error` and extends it by
    /// whatever happens if acquiring additional data fails.
    type Err: From<Error>;

    /// Request at least `len` octets to be available.
    ///
    /// The method returns the number of octets that are actually available.
    /// This may only be smaller than `len` if the source ends with less
    /// octets available.
    fn request(&mut self, len: usize) -> Result<usize, Self::Err>;

    /// Advance the source by `len` octets.
    ///
    /// Advancing beyond the end of a source is a malformed error.
    fn advance(&mut self, len: usize) -> Result<(), Self::Err>;

    /// Returns a slice with the available data.
    ///
    /// The slice will be at least as long as the value returned by the last
    /// successful `request` call.
    fn slice(&self) -> &[u8];

    /// Produces a `Bytes` value for the range `start..end` of the data.
    ///
    /// Both indexes must not be greater than the value returned by the last
    /// successful call to `request`. Implementations may panic otherwise.
    fn bytes(&self, start: usize, end: usize) -> Bytes;

    /// Takes a single octet from the source.
    fn take_u8(&mut self) -> Result<u8, Self::Err> {
        if self.request(1)? < 1 {
            xerr!(return Err(Error::Malformed.into()))
        }
        let res = self.slice()[0];
        self.advance(1)?;
        Ok(res)
    }
}

impl Source for Bytes {
    type Err = Error;

    fn request(&mut self, _len: usize) -> Result<usize, Self::Err> {
        Ok(self.len())
    }

    fn advance(&mut self, len: usize) -> Result<(), Self::Err> {
        if len > self.len() {
            xerr!(Err(Error::Malformed))
        }
        else {
            Buf::advance(self, len);
            Ok(())
        }
    }

    fn slice(&self) -> &[u8] {
        self.as_ref()
    }

    fn bytes(&self, start: usize, end: usize) -> Bytes {
        Bytes::slice(self, start..end)
    }
}

impl<'a> Source for &'a [u8] {
    type Err = Error;

    fn request(&mut self, _len: usize) -> Result<usize, Self::Err> {
        Ok(self.len())
    }

    fn advance(&mut self, len: usize) -> Result<(), Self::Err> {
        if len > self.len() {
            xerr!(Err(Error::Malformed))
        }
        else {
            *self = &self[len..];
            Ok(())
        }
    }

    fn slice(&self) -> &[u8] {
        self
    }

    fn bytes(&self, start: usize, end: usize) -> Bytes {
        Bytes::copy_from_slice(&self[start..end])
    }
}

impl<'a, T: Source> Source for &'a mut T {
    type Err = T::Err;

    fn request(&mut self, len: usize) -> Result<usize, Self::Err> {
        Source::request(*self, len)
    }

    fn advance(&mut self, len: usize) -> Result<(), Self::Err> {
        Source::advance(*self, len)
    }

    fn slice(&self) -> &[u8] {
        Source::slice(*self)
    }

    fn bytes(&self, start: usize, end: usize) -> Bytes {
        Source::bytes(*self, start, end)
    }
}


//------------ LimitedSource -------------------------------------------------

/// A source that is limited to a certain number of octets.
///
/// Without a limit, the source simply passes through to the underlying
/// source. With a limit, it never allows access beyond it.
#[derive(Debug)]
pub struct LimitedSource<S> {
    source: S,
    limit: Option<usize>,
}

impl<S> LimitedSource<S> {
    pub fn new(source: S) -> Self {
        LimitedSource { source, limit: None }
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit
    }
}

impl<S: Source> LimitedSource<S> {
    /// Narrows the limit to `len` octets and returns the previous limit.
    ///
    /// Fails if `len` exceeds the current limit or if the underlying source
    /// doesn’t have that many octets. In this case, the limit is unchanged.
    pub fn limit_further(
        &mut self, len: usize
    ) -> Result<Option<usize>, S::Err> {
        if let Some(cur) = self.limit {
            if len > cur {
                xerr!(return Err(Error::Malformed.into()))
            }
        }
        if self.source.request(len)? < len {
            xerr!(return Err(Error::Malformed.into()))
        }
        Ok(self.limit.replace(len))
    }

    /// Advances over everything up to the limit.
    ///
    /// Without a limit, advances over whatever the underlying source
    /// currently has.
    pub fn skip_all(&mut self) -> Result<(), S::Err> {
        let len = match self.limit {
            Some(limit) => limit,
            None => self.source.request(usize::MAX)?,
        };
        self.advance(len)
    }

    /// Takes everything up to the limit as a `Bytes` value.
    pub fn take_all(&mut self) -> Result<Bytes, S::Err> {
        let len = match self.limit {
            Some(limit) => limit,
            None => self.source.request(usize::MAX)?,
        };
        if self.request(len)? < len {
            xerr!(return Err(Error::Malformed.into()))
        }
        let res = self.bytes(0, len);
        self.advance(len)?;
        Ok(res)
    }

    /// Checks that the source has been advanced to its end.
    pub fn exhausted(&mut self) -> Result<(), S::Err> {
        match self.limit {
            Some(0) => Ok(()),
            Some(_) => xerr!(Err(Error::Malformed.into())),
            None => {
                if self.source.request(1)? == 0 {
                    Ok(())
                }
                else {
                    xerr!(Err(Error::Malformed.into()))
                }
            }
        }
    }
}

impl<S: Source> Source for LimitedSource<S> {
    type Err = S::Err;

    fn request(&mut self, len: usize) -> Result<usize, Self::Err> {
        match self.limit {
            Some(limit) => {
                Ok(min(limit, self.source.request(min(limit, len))?))
            }
            None => self.source.request(len)
        }
    }

    fn advance(&mut self, len: usize) -> Result<(), Self::Err> {
        if let Some(limit) = self.limit {
            if len > limit {
                xerr!(return Err(Error::Malformed.into()))
            }
            self.limit = Some(limit - len);
        }
        self.source.advance(len)
    }

    fn slice(&self) -> &[u8] {
        let res = self.source.slice();
        match self.limit {
            Some(limit) if res.len() > limit => &res[..limit],
            _ => res
        }
    }

    fn bytes(&self, start: usize, end: usize) -> Bytes {
        self.source.bytes(start, end)
    }
}


//------------ CaptureSource -------------------------------------------------

/// A source that remembers what has been advanced over.
///
/// Advancing only moves a private position. Once done, the captured data
/// can be taken out as a `Bytes` value, advancing the underlying source.
pub struct CaptureSource<'a, S: 'a> {
    source: &'a mut S,
    pos: usize,
}

impl<'a, S: Source> CaptureSource<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        CaptureSource { source, pos: 0 }
    }

    /// Returns the captured data and advances the underlying source.
    pub fn into_bytes(self) -> Result<Bytes, S::Err> {
        let res = self.source.bytes(0, self.pos);
        self.source.advance(self.pos)?;
        Ok(res)
    }
}

impl<'a, S: Source + 'a> Source for CaptureSource<'a, S> {
    type Err = S::Err;

    fn request(&mut self, len: usize) -> Result<usize, Self::Err> {
        let avail = self.source.request(self.pos.saturating_add(len))?;
        Ok(avail.saturating_sub(self.pos))
    }

    fn advance(&mut self, len: usize) -> Result<(), Self::Err> {
        if self.request(len)? < len {
            xerr!(return Err(Error::Malformed.into()))
        }
        self.pos += len;
        Ok(())
    }

    fn slice(&self) -> &[u8] {
        &self.source.slice()[self.pos..]
    }

    fn bytes(&self, start: usize, end: usize) -> Bytes {
        self.source.bytes(start + self.pos, end + self.pos)
    }
}


//============ Tests =========================================================
