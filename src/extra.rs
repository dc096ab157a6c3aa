//! Additional certificate fields.
//!
//! Not everything we learn from a certificate deserves an attribute of its
//! own. The rest goes into an ordered map of typed values.

use std::fmt;
use std::collections::BTreeMap;
use bytes::Bytes;


//------------ Extra ---------------------------------------------------------

/// The map of additional fields of a certificate.
pub type Extra = BTreeMap<ExtraKey, ExtraValue>;


//------------ ExtraKey ------------------------------------------------------

/// The key of an additional field.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ExtraKey {
    /// The names of the bits set in the key usage extension.
    KeyUsage,

    /// The path length constraint of the basic constraints extension.
    PathLength,

    /// The purposes listed in the extended key usage extension.
    ExtendedKeyUsage,

    /// The signature algorithm of the certificate.
    SignatureAlgorithm,

    /// The size of the public key in bits.
    KeySize,

    /// The subject key identifier.
    SubjectKeyId,

    /// The key identifier of the authority key identifier extension.
    AuthorityKeyId,

    /// An unknown critical extension identified by its dotted OID.
    Unknown(String),
}

impl ExtraKey {
    /// Returns the field name for the key.
    pub fn name(&self) -> &str {
        match *self {
            ExtraKey::KeyUsage => "keyUsage",
            ExtraKey::PathLength => "pathLen",
            ExtraKey::ExtendedKeyUsage => "extKeyUsage",
            ExtraKey::SignatureAlgorithm => "signatureAlgorithm",
            ExtraKey::KeySize => "keySize",
            ExtraKey::SubjectKeyId => "subjectKeyId",
            ExtraKey::AuthorityKeyId => "authorityKeyId",
            ExtraKey::Unknown(ref oid) => oid,
        }
    }
}

impl fmt::Display for ExtraKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


//------------ ExtraValue ----------------------------------------------------

/// The value of an additional field.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ExtraValue {
    Str(String),
    Int(i64),
    Bytes(Bytes),
}

impl From<String> for ExtraValue {
    fn from(src: String) -> Self {
        ExtraValue::Str(src)
    }
}

impl From<i64> for ExtraValue {
    fn from(src: i64) -> Self {
        ExtraValue::Int(src)
    }
}

impl From<Bytes> for ExtraValue {
    fn from(src: Bytes) -> Self {
        ExtraValue::Bytes(src)
    }
}



//============ Tests =========================================================
