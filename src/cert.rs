//! Certificates and their decoding.
//!
//! Certificates are defined in RFC 5280 as:
//!
//! ```text
//! Certificate  ::=  SEQUENCE  {
//!      tbsCertificate       TBSCertificate,
//!      signatureAlgorithm   AlgorithmIdentifier,
//!      signatureValue       BIT STRING  }
//!
//! TBSCertificate  ::=  SEQUENCE  {
//!      version         [0]  EXPLICIT Version DEFAULT v1,
//!      serialNumber         CertificateSerialNumber,
//!      signature            AlgorithmIdentifier,
//!      issuer               Name,
//!      validity             Validity,
//!      subject              Name,
//!      subjectPublicKeyInfo SubjectPublicKeyInfo,
//!      issuerUniqueID  [1]  IMPLICIT UniqueIdentifier OPTIONAL,
//!      subjectUniqueID [2]  IMPLICIT UniqueIdentifier OPTIONAL,
//!      extensions      [3]  EXPLICIT Extensions OPTIONAL }
//! ```
//!
//! We don’t validate certificates in any way. We only pick out the fields
//! that are of interest for indexing. Since certificates come straight off
//! the wire, decoding is forgiving: a certificate that is cut short or has
//! a broken field still produces everything that could be decoded before
//! and around the problem.

use std::{error, fmt};
use std::convert::TryFrom;
use std::net::{Ipv4Addr, Ipv6Addr};
use bytes::Bytes;
use log::debug;
use crate::algorithm::{Curve, PublicKeyAlgorithm};
use crate::ber::{Constructed, Content, Error, Length, Mode, Oid, Source, Tag};
use crate::extra::{Extra, ExtraKey, ExtraValue};
use crate::name::CertName;
use crate::strlist::StringList;
use crate::time::take_time;


//------------ CertInfo ------------------------------------------------------

/// The indexable fields of a certificate.
///
/// Two values are equal if all their fields are equal. Since the
/// fingerprint is one of the fields, this boils down to the certificates
/// being identical.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct CertInfo {
    /// The start of the validity period in seconds since the epoch.
    ///
    /// This is `0` if the time could not be decoded.
    pub not_before: i64,

    /// The end of the validity period in seconds since the epoch.
    ///
    /// This is `0` if the time could not be decoded.
    pub not_after: i64,

    /// The issuer name.
    pub issuer: CertName,

    /// The subject name.
    pub subject: CertName,

    /// The subject alternative names.
    pub alt: StringList,

    /// The content octets of the serial number exactly as encoded.
    pub serial_number: Bytes,

    /// The fingerprint of the encoded certificate.
    pub hash: Fingerprint,

    /// Whether the basic constraints extension marks this as a CA.
    pub is_ca: bool,

    /// The algorithm of the subject public key if it is known.
    pub public_algorithm: Option<PublicKeyAlgorithm>,

    /// The named curve of an EC public key if it is known.
    pub curve: Option<Curve>,

    /// Additional fields.
    pub extra: Extra,
}

impl CertInfo {
    /// Creates a new empty value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the certificate looks self-signed.
    ///
    /// This doesn’t look at signatures at all. A certificate that isn’t a
    /// CA but has the same single common name and the same organization
    /// names in issuer and subject is considered self-signed.
    pub fn is_self_signed(&self) -> bool {
        !self.is_ca
            && self.issuer.common_name.len() == 1
            && self.issuer.common_name == self.subject.common_name
            && self.issuer.org_name == self.subject.org_name
    }

    /// Decodes a certificate.
    ///
    /// Returns an error only if not even the serial number could be
    /// decoded. Otherwise returns whatever could be decoded and whether
    /// that was everything.
    pub fn decode(data: Bytes) -> Result<Decoded, DecodeError> {
        let outer = LenientSequence::take_from(&data).map_err(|err| {
            DecodeError::new(Stage::Certificate, err)
        })?;
        let mut cert = CertInfo::new();
        cert.hash = Fingerprint::digest(outer.encoded.as_ref());
        let mut partial = outer.truncated;
        if partial {
            debug!("Certificate {}: truncated", cert.hash);
        }

        let tbs = LenientSequence::take_from(&outer.content).map_err(|err| {
            DecodeError::new(Stage::TbsCertificate, err)
        })?;
        partial |= tbs.truncated;

        let mut stage = Some(Stage::Version);
        let res = Mode::Ber.decode(tbs.content, |cons| {
            cert.take_tbs_fields(cons, &mut stage, &mut partial)
        });
        if let Err(err) = res {
            if let Some(stage) = stage {
                debug!(
                    "Certificate {}: failed in {}: {}", cert.hash, stage, err
                );
                return Err(DecodeError::new(stage, err))
            }
            debug!(
                "Certificate {}: broken tbsCertificate: {}", cert.hash, err
            );
            partial = true;
        }

        Ok(Decoded {
            cert,
            status: if partial {
                DecodeStatus::Partial
            }
            else {
                DecodeStatus::Complete
            }
        })
    }

    /// Takes the fields of the tbsCertificate.
    ///
    /// `stage` is set to `None` once the serial number is through.
    fn take_tbs_fields<S: Source>(
        &mut self,
        cons: &mut Constructed<S>,
        stage: &mut Option<Stage>,
        partial: &mut bool,
    ) -> Result<(), S::Err> {
        cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
            cons.take_primitive_if(Tag::INTEGER, |prim| prim.to_u8())
        })?;

        *stage = Some(Stage::SerialNumber);
        self.serial_number = cons.take_primitive_if(
            Tag::INTEGER, |prim| prim.take_all()
        )?;
        *stage = None;

        let signature = cons.sequence(|cons| {
            let algorithm = Oid::take_from(cons)?;
            cons.skip_all()?;
            Ok(algorithm)
        })?;
        self.extra.insert(
            ExtraKey::SignatureAlgorithm,
            ExtraValue::Str(signature.to_string())
        );

        let issuer = cons.sequence(|cons| cons.take_all())?;
        self.contain("issuer", partial, |cert| {
            cert.issuer.decode_into(issuer)
        });

        let validity = cons.sequence(|cons| cons.take_all())?;
        self.contain("validity", partial, |cert| {
            cert.take_validity(validity)
        });

        let subject = cons.sequence(|cons| cons.take_all())?;
        self.contain("subject", partial, |cert| {
            cert.subject.decode_into(subject)
        });

        let key_info = cons.sequence(|cons| cons.take_all())?;
        self.contain("subjectPublicKeyInfo", partial, |cert| {
            cert.take_public_key_info(key_info)
        });

        // issuerUniqueID and subjectUniqueID
        cons.take_opt_value_if(Tag::CTX_1, |content| content.skip_all())?;
        cons.take_opt_value_if(Tag::CTX_2, |content| content.skip_all())?;

        let extensions = cons.take_opt_constructed_if(Tag::CTX_3, |cons| {
            cons.sequence(|cons| cons.take_all())
        })?;
        if let Some(extensions) = extensions {
            let mut broken = false;
            self.contain("extensions", partial, |cert| {
                cert.take_extensions(extensions, &mut broken)
            });
            *partial |= broken;
        }
        Ok(())
    }

    /// Runs `op` and marks the result partial if it fails.
    fn contain<F>(&mut self, field: &str, partial: &mut bool, op: F)
    where F: FnOnce(&mut Self) -> Result<(), Error> {
        if let Err(err) = op(self) {
            debug!("Certificate {}: broken {}: {}", self.hash, field, err);
            *partial = true;
        }
    }

    /// Takes the content of the validity sequence.
    fn take_validity(&mut self, content: Bytes) -> Result<(), Error> {
        Mode::Ber.decode(content, |cons| {
            self.not_before = take_time(cons)?;
            self.not_after = take_time(cons)?;
            Ok(())
        })
    }

    /// Takes the content of the subjectPublicKeyInfo sequence.
    fn take_public_key_info(&mut self, content: Bytes) -> Result<(), Error> {
        Mode::Ber.decode(content, |cons| {
            let (algorithm, parameter) = cons.sequence(|cons| {
                let algorithm = Oid::take_from(cons)?;
                let parameter = Oid::take_opt_from(cons)?;
                cons.skip_all()?;
                Ok((algorithm, parameter))
            })?;
            self.public_algorithm = PublicKeyAlgorithm::from_oid(&algorithm);
            if self.public_algorithm.is_none() {
                debug!(
                    "Certificate {}: unknown public key algorithm {}",
                    self.hash, algorithm
                );
            }
            if self.public_algorithm == Some(PublicKeyAlgorithm::Ec) {
                self.curve = parameter.as_ref().and_then(Curve::from_oid);
            }
            let key = cons.take_primitive_if(Tag::BIT_STRING, |prim| {
                // The first octet is the number of unused bits.
                if prim.take_u8()? > 7 {
                    xerr!(return Err(Error::Malformed))
                }
                prim.take_all()
            })?;
            if self.public_algorithm == Some(PublicKeyAlgorithm::Rsa) {
                if let Some(bits) = rsa_key_size(key) {
                    self.extra.insert(ExtraKey::KeySize, ExtraValue::Int(bits));
                }
            }
            Ok(())
        })
    }

    /// Takes the content of the extensions sequence.
    ///
    /// Each extension that fails to decode is skipped and sets `broken`.
    fn take_extensions(
        &mut self, content: Bytes, broken: &mut bool
    ) -> Result<(), Error> {
        Mode::Ber.decode(content, |cons| {
            while let Some(()) = cons.opt_sequence(|cons| {
                let id = Oid::take_from(cons)?;
                let critical = cons.take_opt_bool()?.unwrap_or(false);
                let value = cons.take_primitive_if(
                    Tag::OCTET_STRING, |prim| prim.take_all()
                )?;
                if let Err(err) = self.take_extension(&id, critical, value) {
                    debug!(
                        "Certificate {}: broken extension {}: {}",
                        self.hash, id, err
                    );
                    *broken = true;
                }
                Ok(())
            })? { }
            Ok(())
        })
    }

    /// Processes the value of a single extension.
    fn take_extension(
        &mut self, id: &Oid, critical: bool, value: Bytes
    ) -> Result<(), Error> {
        if *id == oid::CE_SUBJECT_ALT_NAME {
            Mode::Ber.decode(value, |cons| self.take_alt_names(cons))
        }
        else if *id == oid::CE_BASIC_CONSTRAINTS {
            let path_len = Mode::Ber.decode(value, |cons| {
                cons.sequence(|cons| {
                    self.is_ca = cons.take_opt_bool()?.unwrap_or(false);

                    // A path length we can't represent is dropped.
                    let path_len = cons.take_opt_primitive_if(
                        Tag::INTEGER, |prim| match prim.to_u64() {
                            Ok(path_len) => Ok(Some(path_len)),
                            Err(_) => {
                                prim.skip_all()?;
                                Ok(None)
                            }
                        }
                    )?;
                    Ok(path_len.flatten())
                })
            })?;
            if let Some(path_len) = path_len {
                self.extra.insert(
                    ExtraKey::PathLength,
                    ExtraValue::Int(i64::try_from(path_len).unwrap_or(i64::MAX))
                );
            }
            Ok(())
        }
        else if *id == oid::CE_KEY_USAGE {
            let bits = Mode::Ber.decode(value, |cons| {
                cons.take_primitive_if(Tag::BIT_STRING, |prim| {
                    prim.take_u8()?;
                    prim.take_all()
                })
            })?;
            self.extra.insert(
                ExtraKey::KeyUsage, ExtraValue::Str(key_usage_names(&bits))
            );
            Ok(())
        }
        else if *id == oid::CE_EXTENDED_KEY_USAGE {
            let purposes = Mode::Ber.decode(value, |cons| {
                cons.sequence(|cons| {
                    let mut res = Vec::new();
                    while let Some(purpose) = Oid::take_opt_from(cons)? {
                        res.push(purpose_name(&purpose))
                    }
                    Ok(res)
                })
            })?;
            self.extra.insert(
                ExtraKey::ExtendedKeyUsage,
                ExtraValue::Str(purposes.join(","))
            );
            Ok(())
        }
        else if *id == oid::CE_SUBJECT_KEY_IDENTIFIER {
            let key_id = Mode::Ber.decode(value, |cons| {
                cons.take_primitive_if(Tag::OCTET_STRING, |prim| {
                    prim.take_all()
                })
            })?;
            self.extra.insert(ExtraKey::SubjectKeyId, ExtraValue::Bytes(key_id));
            Ok(())
        }
        else if *id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
            let key_id = Mode::Ber.decode(value, |cons| {
                cons.sequence(|cons| {
                    let key_id = cons.take_opt_primitive_if(
                        Tag::CTX_0, |prim| prim.take_all()
                    )?;
                    cons.skip_all()?;
                    Ok(key_id)
                })
            })?;
            if let Some(key_id) = key_id {
                self.extra.insert(
                    ExtraKey::AuthorityKeyId, ExtraValue::Bytes(key_id)
                );
            }
            Ok(())
        }
        else if critical {
            self.extra.insert(
                ExtraKey::Unknown(id.to_string()), ExtraValue::Bytes(value)
            );
            Ok(())
        }
        else {
            Ok(())
        }
    }

    /// Takes the GeneralNames of the subject alternative name extension.
    ///
    /// ```text
    /// GeneralName ::= CHOICE {
    ///    otherName                       [0]     OtherName,
    ///    rfc822Name                      [1]     IA5String,
    ///    dNSName                         [2]     IA5String,
    ///    x400Address                     [3]     ORAddress,
    ///    directoryName                   [4]     Name,
    ///    ediPartyName                    [5]     EDIPartyName,
    ///    uniformResourceIdentifier       [6]     IA5String,
    ///    iPAddress                       [7]     OCTET STRING,
    ///    registeredID                    [8]     OBJECT IDENTIFIER }
    /// ```
    ///
    /// DNS names and email addresses are lower-cased, URIs are kept as
    /// they are, and IP addresses are converted into their textual form.
    /// All other choices are skipped.
    fn take_alt_names<S: Source>(
        &mut self, cons: &mut Constructed<S>
    ) -> Result<(), S::Err> {
        cons.sequence(|cons| {
            while let Some(()) = cons.take_opt_value(|tag, content| {
                let prim = match *content {
                    Content::Primitive(ref mut prim) => prim,
                    Content::Constructed(ref mut inner) => {
                        return inner.skip_all()
                    }
                };
                if tag == Tag::CTX_1 || tag == Tag::CTX_2 {
                    let name = prim.take_all()?;
                    self.alt.push(name.to_ascii_lowercase());
                }
                else if tag == Tag::CTX_6 {
                    self.alt.push(prim.take_all()?);
                }
                else if tag == Tag::CTX_7 {
                    let addr = prim.take_all()?;
                    if let Some(addr) = ip_addr_str(addr.as_ref()) {
                        self.alt.push(addr);
                    }
                }
                else {
                    prim.skip_all()?;
                }
                Ok(())
            })? { }
            Ok(())
        })
    }
}


//------------ Fingerprint ---------------------------------------------------

/// The SHA-1 digest of an encoded certificate.
///
/// It is displayed as colon separated pairs of lower-case hex digits.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    /// The length of the fingerprint in octets.
    pub const LEN: usize = 20;

    /// Calculates the fingerprint of some data.
    pub fn digest(data: &[u8]) -> Self {
        let digest = ring::digest::digest(
            &ring::digest::SHA1_FOR_LEGACY_USE_ONLY, data
        );
        let mut res = [0u8; Self::LEN];
        res.copy_from_slice(digest.as_ref());
        Fingerprint(res)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<[u8; 20]> for Fingerprint {
    fn from(src: [u8; 20]) -> Self {
        Fingerprint(src)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut octets = self.0.iter();
        if let Some(first) = octets.next() {
            write!(f, "{:02x}", first)?;
        }
        for octet in octets {
            write!(f, ":{:02x}", octet)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}


//------------ Decoded -------------------------------------------------------

/// The result of decoding a certificate.
#[derive(Clone, Debug)]
pub struct Decoded {
    /// Whatever could be decoded.
    pub cert: CertInfo,

    /// Whether decoding went through everything.
    pub status: DecodeStatus,
}

/// Whether a certificate was decoded completely.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeStatus {
    /// All fields were decoded.
    Complete,

    /// Decoding failed somewhere after the serial number.
    Partial,
}

impl DecodeStatus {
    pub fn is_complete(self) -> bool {
        matches!(self, DecodeStatus::Complete)
    }
}


//------------ Stage ---------------------------------------------------------

/// The part of a certificate where decoding failed for good.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// The outer Certificate sequence.
    Certificate,

    /// The tbsCertificate sequence.
    TbsCertificate,

    /// The version field.
    Version,

    /// The serial number.
    SerialNumber,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Stage::Certificate => "certificate",
            Stage::TbsCertificate => "tbsCertificate",
            Stage::Version => "version",
            Stage::SerialNumber => "serial number",
        })
    }
}


//------------ DecodeError ---------------------------------------------------

/// A certificate could not be decoded at all.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecodeError {
    stage: Stage,
    error: Error,
}

impl DecodeError {
    fn new(stage: Stage, error: Error) -> Self {
        DecodeError { stage, error }
    }

    /// Returns where decoding failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the underlying decoder error.
    pub fn error(&self) -> Error {
        self.error
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} in {}", self.error, self.stage)
    }
}

impl error::Error for DecodeError { }


//------------ LenientSequence -----------------------------------------------

/// A SEQUENCE whose header is taken with a grain of salt.
///
/// If the length of the sequence claims more octets than there are, it is
/// cut down to what there is. This way, the beginning of a truncated
/// certificate can still be decoded.
struct LenientSequence {
    /// The complete encoded value, including the header.
    encoded: Bytes,

    /// The content of the value.
    content: Bytes,

    /// Whether the length had to be cut down.
    truncated: bool,
}

impl LenientSequence {
    fn take_from(data: &Bytes) -> Result<Self, Error> {
        let mut source = data.clone();
        let (tag, constructed) = Tag::take_from(&mut source)?;
        if tag != Tag::SEQUENCE || !constructed {
            xerr!(return Err(Error::Malformed))
        }
        let len = match Length::take_from(&mut source, Mode::Ber)? {
            Length::Definite(len) => len,
            Length::Indefinite => xerr!(return Err(Error::Malformed)),
        };
        let header = data.len() - source.len();
        let (len, truncated) = if len > source.len() {
            (source.len(), true)
        }
        else {
            (len, false)
        };
        Ok(LenientSequence {
            encoded: data.slice(..header + len),
            content: source.slice(..len),
            truncated
        })
    }
}


//------------ Helper Functions ----------------------------------------------

/// Returns the number of bits of the modulus of an RSA public key.
fn rsa_key_size(key: Bytes) -> Option<i64> {
    let modulus = Mode::Ber.decode(key, |cons| {
        cons.sequence(|cons| {
            let modulus = cons.take_primitive_if(
                Tag::INTEGER, |prim| prim.take_all()
            )?;
            cons.skip_all()?;
            Ok(modulus)
        })
    }).ok()?;
    let significant = match modulus.iter().position(|&ch| ch != 0) {
        Some(pos) => &modulus[pos..],
        None => return Some(0)
    };
    let len = (significant.len() - 1) * 8
        + (8 - significant[0].leading_zeros() as usize);
    i64::try_from(len).ok()
}

/// Returns the names of the bits set in a key usage bit string.
fn key_usage_names(bits: &[u8]) -> String {
    const NAMES: &[&str] = &[
        "digitalSignature", "nonRepudiation", "keyEncipherment",
        "dataEncipherment", "keyAgreement", "keyCertSign", "cRLSign",
        "encipherOnly", "decipherOnly",
    ];
    NAMES.iter().enumerate().filter(|(bit, _)| {
        bits.get(bit / 8).map(|octet| {
            octet & (0x80 >> (bit % 8)) != 0
        }).unwrap_or(false)
    }).map(|(_, name)| *name).collect::<Vec<_>>().join(",")
}

/// Returns the name of an extended key usage purpose.
fn purpose_name(purpose: &Oid) -> String {
    let octets = purpose.as_ref();
    if octets.len() == oid::KP_PREFIX.len() + 1
        && octets.starts_with(oid::KP_PREFIX)
    {
        let name = match octets[oid::KP_PREFIX.len()] {
            1 => Some("serverAuth"),
            2 => Some("clientAuth"),
            3 => Some("codeSigning"),
            4 => Some("emailProtection"),
            8 => Some("timeStamping"),
            9 => Some("OCSPSigning"),
            _ => None
        };
        if let Some(name) = name {
            return name.into()
        }
    }
    purpose.to_string()
}

/// Converts the octets of an iPAddress general name into a string.
///
/// Only plain IPv4 and IPv6 addresses are converted. Anything else, such
/// as the address and mask pairs of name constraints, results in `None`.
fn ip_addr_str(octets: &[u8]) -> Option<String> {
    if let Ok(addr) = <[u8; 4]>::try_from(octets) {
        Some(Ipv4Addr::from(addr).to_string())
    }
    else if let Ok(addr) = <[u8; 16]>::try_from(octets) {
        Some(Ipv6Addr::from(addr).to_string())
    }
    else {
        None
    }
}


//------------ OIDs ----------------------------------------------------------

mod oid {
    use crate::ber::Oid;

    pub const CE_SUBJECT_KEY_IDENTIFIER: Oid<&[u8]> = Oid(&[85, 29, 14]);
    pub const CE_KEY_USAGE: Oid<&[u8]> = Oid(&[85, 29, 15]);
    pub const CE_SUBJECT_ALT_NAME: Oid<&[u8]> = Oid(&[85, 29, 17]);
    pub const CE_BASIC_CONSTRAINTS: Oid<&[u8]> = Oid(&[85, 29, 19]);
    pub const CE_AUTHORITY_KEY_IDENTIFIER: Oid<&[u8]> = Oid(&[85, 29, 35]);
    pub const CE_EXTENDED_KEY_USAGE: Oid<&[u8]> = Oid(&[85, 29, 37]);

    /// The prefix of the key purposes, 1.3.6.1.5.5.7.3.
    pub const KP_PREFIX: &[u8] = &[43, 6, 1, 5, 5, 7, 3];
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{
        der, rsa_key, TestCert, BASIC_CONSTRAINTS, CN, KEY_USAGE,
        SUBJECT_ALT_NAME
    };

    fn alt_names() -> Vec<u8> {
        der::extension(SUBJECT_ALT_NAME, false, &der::sequence(&[
            der::ctx_prim(2, b"WWW.Example.COM"),
            der::ctx_prim(7, &[192, 0, 2, 1]),
            der::ctx(4, &der::name(&[(CN, 0x0c, "Directory")])),
            der::ctx_prim(6, b"https://Example.com/X"),
            der::ctx_prim(7, &[0; 8]),
            der::ctx_prim(
                7, &[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
            ),
        ].concat()))
    }

    fn basic_constraints(ca: bool, path_len: Option<u8>) -> Vec<u8> {
        let mut content = der::boolean(ca);
        if let Some(path_len) = path_len {
            content.extend(der::integer(&[path_len]));
        }
        der::extension(BASIC_CONSTRAINTS, true, &der::sequence(&content))
    }

    fn strs(list: &StringList) -> Vec<String> {
        list.iter_str().map(Into::into).collect()
    }

    #[test]
    fn decode_complete() {
        let mut builder = TestCert::default();
        builder.extensions = vec![
            alt_names(),
            basic_constraints(false, None),
            der::extension(KEY_USAGE, true, &der::bit_string(&[0x80])),
        ];
        let encoded = builder.to_bytes();
        let decoded = CertInfo::decode(encoded.clone()).unwrap();
        assert_eq!(decoded.status, DecodeStatus::Complete);

        let cert = decoded.cert;
        assert_eq!(cert.hash, Fingerprint::digest(encoded.as_ref()));
        assert_eq!(cert.serial_number.as_ref(), b"\x01\x23\x45\x67\x89");
        assert_eq!(cert.not_before, 1577836800);
        assert_eq!(cert.not_after, 1704067200);
        assert_eq!(strs(&cert.issuer.common_name), ["example ca"]);
        assert_eq!(strs(&cert.issuer.org_name), ["Example Org"]);
        assert_eq!(strs(&cert.subject.common_name), ["www.example.com"]);
        assert_eq!(strs(&cert.subject.org_unit), ["Web"]);
        assert_eq!(
            strs(&cert.alt),
            [
                "www.example.com", "192.0.2.1", "https://Example.com/X",
                "2001:db8::1"
            ]
        );
        assert!(!cert.is_ca);
        assert_eq!(cert.public_algorithm, Some(PublicKeyAlgorithm::Ec));
        assert_eq!(cert.curve, Some(Curve::Prime256v1));
        assert_eq!(
            cert.extra.get(&ExtraKey::SignatureAlgorithm),
            Some(&ExtraValue::Str("1.2.840.113549.1.1.11".into()))
        );
        assert_eq!(
            cert.extra.get(&ExtraKey::KeyUsage),
            Some(&ExtraValue::Str("digitalSignature".into()))
        );
        assert_eq!(cert.extra.get(&ExtraKey::PathLength), None);
        assert!(!cert.is_self_signed());
    }

    #[test]
    fn ca_with_rsa_key() {
        let mut builder = TestCert::default();
        builder.spki = rsa_key(256);
        builder.extensions = vec![
            basic_constraints(true, Some(0)),
            der::extension(KEY_USAGE, true, &der::bit_string(&[0x06])),
        ];
        let decoded = CertInfo::decode(builder.to_bytes()).unwrap();
        assert!(decoded.status.is_complete());
        let cert = decoded.cert;
        assert!(cert.is_ca);
        assert_eq!(cert.public_algorithm, Some(PublicKeyAlgorithm::Rsa));
        assert_eq!(cert.curve, None);
        assert_eq!(
            cert.extra.get(&ExtraKey::KeySize), Some(&ExtraValue::Int(2048))
        );
        assert_eq!(
            cert.extra.get(&ExtraKey::PathLength), Some(&ExtraValue::Int(0))
        );
        assert_eq!(
            cert.extra.get(&ExtraKey::KeyUsage),
            Some(&ExtraValue::Str("keyCertSign,cRLSign".into()))
        );
    }

    #[test]
    fn truncated_certificate() {
        let encoded = TestCert::default().encode();

        // Drop the signature and the tail of the public key.
        let cut = Bytes::copy_from_slice(&encoded[..encoded.len() - 32 - 50]);
        let decoded = CertInfo::decode(cut.clone()).unwrap();
        assert_eq!(decoded.status, DecodeStatus::Partial);
        let cert = decoded.cert;
        assert_eq!(cert.hash, Fingerprint::digest(cut.as_ref()));
        assert_eq!(strs(&cert.issuer.common_name), ["example ca"]);
        assert_eq!(strs(&cert.subject.common_name), ["www.example.com"]);
        assert_eq!(cert.not_after, 1704067200);
        assert_eq!(cert.public_algorithm, None);
    }

    #[test]
    fn broken_field_is_contained() {
        let mut builder = TestCert::default();
        builder.subject = der::sequence(b"\x31\x05\x30");
        builder.extensions = vec![
            der::extension(SUBJECT_ALT_NAME, false, b"\x30\x05\x82"),
            basic_constraints(true, None),
        ];
        let decoded = CertInfo::decode(builder.to_bytes()).unwrap();
        assert_eq!(decoded.status, DecodeStatus::Partial);
        let cert = decoded.cert;
        assert!(cert.subject.is_empty());
        assert!(cert.alt.is_empty());
        assert!(cert.is_ca);
        assert_eq!(cert.public_algorithm, Some(PublicKeyAlgorithm::Ec));
    }

    #[test]
    fn unrepresentable_path_length() {
        for path_len in [&[0xffu8][..], &[0x01; 9][..], &[0x00, 0x05][..]] {
            let mut builder = TestCert::default();
            builder.extensions = vec![der::extension(
                BASIC_CONSTRAINTS, true, &der::sequence(&[
                    der::boolean(true), der::integer(path_len)
                ].concat())
            )];
            let decoded = CertInfo::decode(builder.to_bytes()).unwrap();
            assert_eq!(decoded.status, DecodeStatus::Complete);
            assert!(decoded.cert.is_ca);
            assert_eq!(decoded.cert.extra.get(&ExtraKey::PathLength), None);
        }
    }

    #[test]
    fn ca_flag_survives_broken_constraints() {
        let mut builder = TestCert::default();
        builder.extensions = vec![der::extension(
            BASIC_CONSTRAINTS, true, &der::sequence(&[
                der::boolean(true), der::octet_string(b"junk")
            ].concat())
        )];
        let decoded = CertInfo::decode(builder.to_bytes()).unwrap();
        assert_eq!(decoded.status, DecodeStatus::Partial);
        assert!(decoded.cert.is_ca);
    }

    #[test]
    fn unusable_input() {
        let stage = |data: Vec<u8>| {
            CertInfo::decode(data.into()).unwrap_err().stage()
        };
        assert_eq!(stage(Vec::new()), Stage::Certificate);
        assert_eq!(stage(der::octet_string(b"")), Stage::Certificate);
        assert_eq!(
            stage(der::sequence(&der::octet_string(b""))),
            Stage::TbsCertificate
        );
        assert_eq!(
            stage(der::sequence(&der::sequence(&[
                der::ctx(0, &der::octet_string(b"")),
            ].concat()))),
            Stage::Version
        );
        assert_eq!(
            stage(der::sequence(&der::sequence(&[
                der::ctx(0, &der::integer(&[2])),
                der::octet_string(b""),
            ].concat()))),
            Stage::SerialNumber
        );
        assert_eq!(
            stage(der::sequence(&der::sequence(b""))),
            Stage::SerialNumber
        );
    }

    #[test]
    fn usable_after_serial() {
        let tbs = der::sequence(&der::integer(&[0x2a]));
        let decoded = CertInfo::decode(der::sequence(&tbs).into()).unwrap();
        assert_eq!(decoded.status, DecodeStatus::Partial);
        assert_eq!(decoded.cert.serial_number.as_ref(), b"\x2a");
    }

    #[test]
    fn extensions() {
        let mut builder = TestCert::default();
        builder.extensions = vec![
            der::extension(&[43, 6, 1, 4, 1, 99], true, b"\x05\x00"),
            der::extension(&[43, 6, 1, 4, 1, 98], false, b"\x05\x00"),
            der::extension(&[85, 29, 14], false, &der::octet_string(b"ski")),
            der::extension(&[85, 29, 37], false, &der::sequence(&[
                der::oid(&[43, 6, 1, 5, 5, 7, 3, 1]),
                der::oid(&[43, 6, 1, 5, 5, 7, 3, 2]),
                der::oid(&[43, 6, 1, 4, 1, 99]),
            ].concat())),
        ];
        let cert = CertInfo::decode(builder.to_bytes()).unwrap().cert;
        assert_eq!(
            cert.extra.get(&ExtraKey::Unknown("1.3.6.1.4.1.99".into())),
            Some(&ExtraValue::Bytes(Bytes::from_static(b"\x05\x00")))
        );
        assert_eq!(
            cert.extra.get(&ExtraKey::Unknown("1.3.6.1.4.1.98".into())),
            None
        );
        assert_eq!(
            cert.extra.get(&ExtraKey::SubjectKeyId),
            Some(&ExtraValue::Bytes(Bytes::from_static(b"ski")))
        );
        assert_eq!(
            cert.extra.get(&ExtraKey::ExtendedKeyUsage),
            Some(&ExtraValue::Str(
                "serverAuth,clientAuth,1.3.6.1.4.1.99".into()
            ))
        );
    }

    #[test]
    fn self_signed() {
        let mut builder = TestCert::default();
        builder.issuer = der::name(&[(CN, 0x0c, "localhost")]);
        builder.subject = der::name(&[(CN, 0x13, "LOCALHOST")]);
        let mut cert = CertInfo::decode(builder.to_bytes()).unwrap().cert;
        assert!(cert.is_self_signed());
        cert.is_ca = true;
        assert!(!cert.is_self_signed());
    }

    #[test]
    fn equal_content_is_equal() {
        let one = CertInfo::decode(TestCert::default().to_bytes()).unwrap();
        let two = CertInfo::decode(TestCert::default().to_bytes()).unwrap();
        assert_eq!(one.cert, two.cert);

        let mut builder = TestCert::default();
        builder.serial = vec![0x02];
        let three = CertInfo::decode(builder.to_bytes()).unwrap();
        assert_ne!(one.cert, three.cert);
    }

    #[test]
    fn fingerprint_display() {
        let mut octets = [0u8; 20];
        octets[0] = 0xab;
        octets[19] = 0x01;
        let text = Fingerprint::from(octets).to_string();
        assert_eq!(text.len(), 59);
        assert!(text.starts_with("ab:00:"));
        assert!(text.ends_with(":00:01"));
    }
}
