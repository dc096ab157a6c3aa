//! The identifer octets of an encoded value.
//!
//! This is a private module. Its public content is being re-exported by the
//! parent module.

use std::fmt;
use super::error::Error;
use super::source::Source;


//------------ Tag -----------------------------------------------------------

/// The tag of an encoded value.
///
/// Each encoded value starts with a sequence of one or more octets called
/// the _identifier octets._ They encode both the tag of the value as well as
/// whether the value is primitive or constructed. This type represents the
/// tag while the latter is represented by the decoder types `Primitive` or
/// `Constructed`.
///
/// The tag in turn consists of two parts: the class and the number – the
/// `Tag` type includes both of them. Tag numbers above 30 use the multi-octet
/// form of the identifier octets. We accept numbers that fit into 28 bits,
/// i.e., up to four subsequent octets, which is more than anything found in
/// a certificate.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Tag {
    /// The class bits in the position they have in the first octet.
    class: u8,

    /// The tag number.
    number: u32,
}

impl Tag {
    /// The class bits of the ‘universal’ class.
    const UNIVERSAL: u8 = 0x00;

    /// The class bits of the ‘context-specific’ class.
    const CONTEXT_SPECIFIC: u8 = 0x80;

    /// The largest number of subsequent octets of a multi-octet tag.
    const MAX_NUMBER_OCTETS: usize = 4;

    /// The tag marking the end-of-value in an indefinite length value.
    pub const END_OF_VALUE: Self = Tag::universal(0);

    /// The tag for the BOOLEAN type, UNIVERSAL 1.
    pub const BOOLEAN: Self = Tag::universal(1);

    /// The tag for the INTEGER type, UNIVERSAL 2.
    pub const INTEGER: Self = Tag::universal(2);

    /// The tag for the BIT STRING type, UNIVERSAL 3.
    pub const BIT_STRING: Self = Tag::universal(3);

    /// The tag for the OCTET STRING type, UNIVERSAL 4.
    pub const OCTET_STRING: Self = Tag::universal(4);

    /// The tag for the NULL type, UNIVERSAL 5.
    pub const NULL: Self = Tag::universal(5);

    /// The tag for the OBJECT IDENTIFIER type, UNIVERSAL 6.
    pub const OID: Self = Tag::universal(6);

    /// The tag for the UTF8String type, UNIVERSAL 12.
    pub const UTF8_STRING: Self = Tag::universal(12);

    /// The tag for the SEQUENCE and SEQUENCE OF types, UNIVERSAL 16.
    pub const SEQUENCE: Self = Tag::universal(16);

    /// The tag for the SET and SET OF types, UNIVERSAL 17.
    pub const SET: Self = Tag::universal(17);

    /// The tag for the PrintableString type, UNIVERSAL 19.
    pub const PRINTABLE_STRING: Self = Tag::universal(19);

    /// The tag for the TeletexString type, UNIVERSAL 20.
    pub const TELETEX_STRING: Self = Tag::universal(20);

    /// The tag for the IA5String type, UNIVERSAL 22.
    pub const IA5_STRING: Self = Tag::universal(22);

    /// The tag for the UTCTime type, UNIVERSAL 23.
    pub const UTC_TIME: Self = Tag::universal(23);

    /// The tag for the GeneralizedTime type, UNIVERAL 24.
    pub const GENERALIZED_TIME: Self = Tag::universal(24);

    /// The tag for the BMPString type, UNIVERSAL 30.
    pub const BMP_STRING: Self = Tag::universal(30);

    /// The context specific tag [0].
    pub const CTX_0: Self = Tag::ctx(0);

    /// The context specific tag [1].
    pub const CTX_1: Self = Tag::ctx(1);

    /// The context specific tag [2].
    pub const CTX_2: Self = Tag::ctx(2);

    /// The context specific tag [3].
    pub const CTX_3: Self = Tag::ctx(3);

    /// The context specific tag [6].
    pub const CTX_6: Self = Tag::ctx(6);

    /// The context specific tag [7].
    pub const CTX_7: Self = Tag::ctx(7);

    /// Creates a tag of the universal class with the given number.
    pub const fn universal(number: u32) -> Self {
        Tag { class: Self::UNIVERSAL, number }
    }

    /// Creates a context specific tag with the given number.
    pub const fn ctx(number: u32) -> Self {
        Tag { class: Self::CONTEXT_SPECIFIC, number }
    }

    /// Returns the tag number.
    pub fn number(self) -> u32 {
        self.number
    }
}

impl Tag {
    /// Takes a tag from the beginning of a source.
    ///
    /// Upon success, returns both the tag and whether the value is
    /// constructed. If there are no more octets available in the source,
    /// an error is returned.
    pub fn take_from<S: Source>(
        source: &mut S,
    ) -> Result<(Self, bool), S::Err> {
        let first = source.take_u8()?;
        let class = first & 0xc0;
        let constructed = first & 0x20 != 0;
        if first & 0x1f != 0x1f {
            let number = (first & 0x1f) as u32;
            return Ok((Tag { class, number }, constructed))
        }

        // Multi-octet form: base-128 digits with bit 7 set on all but the
        // last octet.
        let mut number = 0u32;
        for i in 0..Self::MAX_NUMBER_OCTETS {
            let octet = source.take_u8()?;
            if i == 0 && octet == 0x80 {
                // Leading zero digit.
                xerr!(return Err(Error::Malformed.into()))
            }
            number = number << 7 | (octet & 0x7f) as u32;
            if octet & 0x80 == 0 {
                if number < 0x1f {
                    // Should have used the single octet form.
                    xerr!(return Err(Error::Malformed.into()))
                }
                return Ok((Tag { class, number }, constructed))
            }
        }
        xerr!(Err(Error::Unimplemented.into()))
    }

    /// Takes a tag from the beginning of a source if it matches this tag.
    ///
    /// If there is no more data available in the source or if the tag is
    /// something else, returns `Ok(None)` and leaves the source untouched.
    /// If the tag matches `self`, returns whether the value is constructed.
    pub fn take_from_if<S: Source>(
        self,
        source: &mut S,
    ) -> Result<Option<bool>, S::Err> {
        let avail = source.request(1 + Self::MAX_NUMBER_OCTETS)?;
        if avail == 0 {
            return Ok(None)
        }
        let mut peek = &source.slice()[..avail];
        let (tag, constructed) = match Tag::take_from(&mut peek) {
            Ok(res) => res,
            Err(err) => return Err(err.into()),
        };
        if tag != self {
            return Ok(None)
        }
        let used = avail - peek.len();
        source.advance(used)?;
        Ok(Some(constructed))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Tag::BOOLEAN => write!(f, "BOOLEAN"),
            Tag::INTEGER => write!(f, "INTEGER"),
            Tag::BIT_STRING => write!(f, "BIT STRING"),
            Tag::OCTET_STRING => write!(f, "OCTET STRING"),
            Tag::NULL => write!(f, "NULL"),
            Tag::OID => write!(f, "OBJECT IDENTIFIER"),
            Tag::UTF8_STRING => write!(f, "UTF8String"),
            Tag::SEQUENCE => write!(f, "SEQUENCE"),
            Tag::SET => write!(f, "SET"),
            Tag::PRINTABLE_STRING => write!(f, "PrintableString"),
            Tag::TELETEX_STRING => write!(f, "TeletexString"),
            Tag::IA5_STRING => write!(f, "IA5String"),
            Tag::UTC_TIME => write!(f, "UTCTime"),
            Tag::GENERALIZED_TIME => write!(f, "GeneralizedTime"),
            Tag::BMP_STRING => write!(f, "BMPString"),
            _ => {
                match self.class {
                    Tag::UNIVERSAL => write!(f, "UNIVERSAL {}", self.number),
                    Tag::CONTEXT_SPECIFIC => write!(f, "[{}]", self.number),
                    0x40 => write!(f, "APPLICATION {}", self.number),
                    _ => write!(f, "PRIVATE {}", self.number),
                }
            }
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_octet() {
        let mut data: &[u8] = b"\x30\xa3\x02";
        assert_eq!(Tag::take_from(&mut data), Ok((Tag::SEQUENCE, true)));
        assert_eq!(Tag::take_from(&mut data), Ok((Tag::CTX_3, true)));
        assert_eq!(Tag::take_from(&mut data), Ok((Tag::INTEGER, false)));
        assert_eq!(Tag::take_from(&mut data), Err(Error::Malformed));
    }

    #[test]
    fn multi_octet() {
        let mut data: &[u8] = b"\x9f\x81\x00\x9f\x21";
        assert_eq!(Tag::take_from(&mut data), Ok((Tag::ctx(128), false)));
        assert_eq!(Tag::take_from(&mut data), Ok((Tag::ctx(33), false)));
        assert!(data.is_empty());

        // Leading zero digit and numbers that fit a single octet.
        assert_eq!(
            Tag::take_from(&mut &b"\x1f\x80\x01"[..]),
            Err(Error::Malformed)
        );
        assert_eq!(
            Tag::take_from(&mut &b"\x1f\x05"[..]),
            Err(Error::Malformed)
        );

        // Too many octets.
        assert_eq!(
            Tag::take_from(&mut &b"\x1f\x81\x81\x81\x81\x01"[..]),
            Err(Error::Unimplemented)
        );
    }

    #[test]
    fn take_from_if_leaves_mismatch() {
        let mut data: &[u8] = b"\x9f\x21\x00";
        assert_eq!(Tag::CTX_1.take_from_if(&mut data), Ok(None));
        assert_eq!(data.len(), 3);
        assert_eq!(Tag::ctx(33).take_from_if(&mut data), Ok(Some(false)));
        assert_eq!(data, b"\x00");
    }
}
