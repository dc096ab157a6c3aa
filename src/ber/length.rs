//! The length octets of an encoded value.
//!
//! This is a private module. Its public content is being re-exported by the
//! parent module.

use super::content::Mode;
use super::error::Error;
use super::source::Source;


//------------ Length -------------------------------------------------------

/// The length octets of an encoded value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Length {
    /// A length value in definite form.
    ///
    /// Provides the actual length of the content in octets.
    Definite(usize),

    /// A length value in indefinite form.
    ///
    /// In this form, the end of a value is determined by a special tag.
    Indefinite
}

impl Length {
    /// The largest number of subsequent length octets we accept.
    ///
    /// Four octets already allow for values of up to 4 GiB which is way
    /// more than any certificate.
    const MAX_OCTETS: usize = 4;

    /// Takes the length octets from the beginning of a source.
    ///
    /// In DER mode, the length must be encoded in the shortest possible
    /// form and the indefinite form is rejected. Lengths encoded in more
    /// than four octets are reported as unimplemented.
    pub fn take_from<S: Source>(
        source: &mut S, mode: Mode
    ) -> Result<Self, S::Err> {
        let first = source.take_u8()?;

        // Bit 7 clear: other bits are the length.
        if first & 0x80 == 0 {
            return Ok(Length::Definite(first as usize))
        }

        // Bit 7 set: other bits are the number of octets that encode
        // the length. Unless they are all 0, in which case this is the
        // indefinite form.
        let count = (first & 0x7f) as usize;
        if count == 0 {
            if mode == Mode::Der {
                xerr!(return Err(Error::Malformed.into()))
            }
            return Ok(Length::Indefinite)
        }
        if count > Self::MAX_OCTETS {
            xerr!(return Err(Error::Unimplemented.into()))
        }
        let mut len = 0usize;
        for i in 0..count {
            let octet = source.take_u8()?;
            if i == 0 && octet == 0 && mode == Mode::Der {
                // Leading zero octet: not the shortest form.
                xerr!(return Err(Error::Malformed.into()))
            }
            len = len << 8 | octet as usize;
        }
        if mode == Mode::Der && len < 0x80 {
            // Would have fit into the short form.
            xerr!(return Err(Error::Malformed.into()))
        }
        Ok(Length::Definite(len))
    }

    /// Returns whether the length is definite and zero.
    pub fn is_zero(self) -> bool {
        matches!(self, Length::Definite(0))
    }
}


//============ Tests =========================================================
