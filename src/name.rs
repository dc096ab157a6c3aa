//! Issuer and subject names.
//!
//! A certificate name is a sequence of relative distinguished names, each
//! a set of attribute type and value pairs. We only pick out the common
//! name, the organization name, and the organizational unit name. All
//! other attributes are skipped.

use std::str;
use bytes::Bytes;
use crate::ber::{Content, Error, Mode, Oid, Primitive, Source, Tag};
use crate::strlist::StringList;


//------------ CertName ------------------------------------------------------

/// The attributes of interest from a certificate name.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CertName {
    /// The common names, lower-cased.
    pub common_name: StringList,

    /// The organization names.
    pub org_name: StringList,

    /// The organizational unit names.
    pub org_unit: StringList,

    /// Whether all decoded values are valid UTF-8.
    pub utf8: bool,
}

impl Default for CertName {
    fn default() -> Self {
        CertName {
            common_name: StringList::new(),
            org_name: StringList::new(),
            org_unit: StringList::new(),
            utf8: true,
        }
    }
}

impl CertName {
    /// The OID of the commonName attribute, 2.5.4.3.
    const COMMON_NAME: Oid<&'static [u8]> = Oid(&[85, 4, 3]);

    /// The OID of the organizationName attribute, 2.5.4.10.
    const ORG_NAME: Oid<&'static [u8]> = Oid(&[85, 4, 10]);

    /// The OID of the organizationalUnitName attribute, 2.5.4.11.
    const ORG_UNIT: Oid<&'static [u8]> = Oid(&[85, 4, 11]);

    /// Returns whether no attribute of interest has been found.
    pub fn is_empty(&self) -> bool {
        self.common_name.is_empty()
            && self.org_name.is_empty()
            && self.org_unit.is_empty()
    }

    /// Decodes the content of a Name SEQUENCE into `self`.
    ///
    /// Attributes are added as they are found. If decoding fails half way,
    /// everything found up to that point stays.
    pub fn decode_into(&mut self, content: Bytes) -> Result<(), Error> {
        Mode::Ber.decode(content, |cons| {
            while let Some(()) = cons.opt_set(|cons| {
                while let Some(()) = cons.opt_sequence(|cons| {
                    let oid = Oid::take_from(cons)?;
                    cons.take_value(|tag, content| {
                        self.take_attribute(&oid, tag, content)
                    })
                })? { }
                Ok(())
            })? { }
            Ok(())
        })
    }

    /// Processes the value of a single attribute.
    fn take_attribute<S: Source>(
        &mut self,
        oid: &Oid,
        tag: Tag,
        content: &mut Content<S>
    ) -> Result<(), S::Err> {
        let target = if *oid == Self::COMMON_NAME {
            &mut self.common_name
        }
        else if *oid == Self::ORG_NAME {
            &mut self.org_name
        }
        else if *oid == Self::ORG_UNIT {
            &mut self.org_unit
        }
        else {
            return content.skip_all()
        };
        let prim = match *content {
            Content::Primitive(ref mut prim) => prim,
            Content::Constructed(ref mut cons) => return cons.skip_all()
        };
        let value = match DirectoryString::take_from(tag, prim)? {
            Some(value) => value,
            None => return Ok(())
        };
        if !value.utf8 {
            self.utf8 = false
        }
        let value = if *oid == Self::COMMON_NAME {
            value.to_lowercase()
        }
        else {
            value.octets
        };
        target.push(value);
        Ok(())
    }
}


//------------ DirectoryString -----------------------------------------------

/// The value of a string attribute.
struct DirectoryString {
    /// The octets of the string.
    ///
    /// BMPString values have been converted to UTF-8. Everything else is
    /// as encoded.
    octets: Bytes,

    /// Whether the octets are valid UTF-8.
    utf8: bool,
}

impl DirectoryString {
    /// Takes the string from a primitive value with the given tag.
    ///
    /// Returns `Ok(None)` and skips the value if it isn’t one of the string
    /// types we understand.
    fn take_from<S: Source>(
        tag: Tag, prim: &mut Primitive<S>
    ) -> Result<Option<Self>, S::Err> {
        match tag {
            Tag::UTF8_STRING | Tag::PRINTABLE_STRING | Tag::TELETEX_STRING
            | Tag::IA5_STRING => {
                let octets = prim.take_all()?;
                let utf8 = str::from_utf8(octets.as_ref()).is_ok();
                Ok(Some(DirectoryString { octets, utf8 }))
            }
            Tag::BMP_STRING => {
                let octets = prim.take_all()?;
                Ok(Some(DirectoryString {
                    octets: decode_bmp(octets.as_ref()).into(),
                    utf8: true
                }))
            }
            _ => {
                prim.skip_all()?;
                Ok(None)
            }
        }
    }

    /// Returns the lower-cased octets.
    ///
    /// Valid UTF-8 is lower-cased according to Unicode, anything else
    /// only in the ASCII range.
    fn to_lowercase(&self) -> Bytes {
        match str::from_utf8(self.octets.as_ref()) {
            Ok(s) => s.to_lowercase().into(),
            Err(_) => self.octets.to_ascii_lowercase().into(),
        }
    }
}

/// Converts the UTF-16BE content of a BMPString into a string.
///
/// Broken surrogates become replacement characters and a trailing odd
/// octet is dropped.
fn decode_bmp(octets: &[u8]) -> String {
    let units = octets.chunks_exact(2).map(|pair| {
        u16::from_be_bytes([pair[0], pair[1]])
    });
    char::decode_utf16(units).map(|ch| {
        ch.unwrap_or(char::REPLACEMENT_CHARACTER)
    }).collect()
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::der;

    fn attr(oid: &[u8], tag: u8, value: &[u8]) -> Vec<u8> {
        der::set(&der::sequence(&[
            der::tlv(0x06, oid), der::tlv(tag, value)
        ].concat()))
    }

    fn decode(content: Vec<u8>) -> (CertName, Result<(), Error>) {
        let mut name = CertName::default();
        let res = name.decode_into(content.into());
        (name, res)
    }

    #[test]
    fn picks_attributes_in_order() {
        let (name, res) = decode([
            attr(&[85, 4, 6], 0x13, b"NL"),
            attr(&[85, 4, 10], 0x13, b"Example Org"),
            attr(&[85, 4, 11], 0x0c, b"Unit A"),
            attr(&[85, 4, 11], 0x13, b"Unit B"),
            attr(&[85, 4, 3], 0x0c, b"WWW.Example.COM"),
        ].concat());
        assert!(res.is_ok());
        assert_eq!(
            name.common_name.iter_str().collect::<Vec<_>>(),
            ["www.example.com"]
        );
        assert_eq!(
            name.org_name.iter_str().collect::<Vec<_>>(), ["Example Org"]
        );
        assert_eq!(
            name.org_unit.iter_str().collect::<Vec<_>>(), ["Unit A", "Unit B"]
        );
        assert!(name.utf8);
    }

    #[test]
    fn multi_valued_rdn() {
        let rdn = der::set(&[
            der::sequence(&[
                der::tlv(0x06, &[85, 4, 3]), der::tlv(0x13, b"One")
            ].concat()),
            der::sequence(&[
                der::tlv(0x06, &[85, 4, 3]), der::tlv(0x13, b"Two")
            ].concat()),
        ].concat());
        let (name, res) = decode(rdn);
        assert!(res.is_ok());
        assert_eq!(
            name.common_name.iter_str().collect::<Vec<_>>(), ["one", "two"]
        );
    }

    #[test]
    fn string_types() {
        let (name, res) = decode([
            attr(&[85, 4, 3], 0x1e, &[0x00, 0x41, 0x00, 0xc4]),
            attr(&[85, 4, 10], 0x14, b"Caf\xe9"),
            attr(&[85, 4, 10], 0x1a, b"Visible"),
        ].concat());
        assert!(res.is_ok());
        assert_eq!(
            name.common_name.iter_str().collect::<Vec<_>>(), ["a\u{e4}"]
        );
        assert_eq!(
            name.org_name.iter_str().collect::<Vec<_>>(), ["Caf\u{e9}"]
        );
        assert!(!name.utf8);
    }

    #[test]
    fn unicode_lower_casing() {
        let (name, _) = decode(
            attr(&[85, 4, 3], 0x0c, "ÄRGER.Example".as_bytes())
        );
        assert_eq!(
            name.common_name.first().map(|s| s.as_ref()),
            Some("ärger.example".as_bytes())
        );
    }

    #[test]
    fn partial_name_is_kept() {
        let mut content = attr(&[85, 4, 3], 0x13, b"first");
        content.extend_from_slice(b"\x31\x10\x30");
        let (name, res) = decode(content);
        assert!(res.is_err());
        assert_eq!(name.common_name.len(), 1);
    }
}
