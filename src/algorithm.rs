//! Known public key algorithms and elliptic curves.
//!
//! Certificates identify these through object identifiers. We only know a
//! fixed set of them and keep them as plain enums. Anything else is simply
//! not recorded.

use std::fmt;
use crate::ber::Oid;


//------------ PublicKeyAlgorithm --------------------------------------------

/// The algorithm of a certificate’s subject public key.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PublicKeyAlgorithm {
    Rsa,
    RsaPss,
    Dsa,
    Ec,
    Ed25519,
    Ed448,
    X25519,
    X448,
}

impl PublicKeyAlgorithm {
    /// The known algorithms with their object identifiers.
    const KNOWN: &'static [(Oid<&'static [u8]>, Self)] = &[
        // 1.2.840.113549.1.1.1
        (Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 1]), PublicKeyAlgorithm::Rsa),
        // 1.2.840.113549.1.1.10
        (
            Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 10]),
            PublicKeyAlgorithm::RsaPss
        ),
        // 1.2.840.10040.4.1
        (Oid(&[42, 134, 72, 206, 56, 4, 1]), PublicKeyAlgorithm::Dsa),
        // 1.2.840.10045.2.1
        (Oid(&[42, 134, 72, 206, 61, 2, 1]), PublicKeyAlgorithm::Ec),
        // 1.3.101.112
        (Oid(&[43, 101, 112]), PublicKeyAlgorithm::Ed25519),
        // 1.3.101.113
        (Oid(&[43, 101, 113]), PublicKeyAlgorithm::Ed448),
        // 1.3.101.110
        (Oid(&[43, 101, 110]), PublicKeyAlgorithm::X25519),
        // 1.3.101.111
        (Oid(&[43, 101, 111]), PublicKeyAlgorithm::X448),
    ];

    /// Looks up the algorithm for an object identifier.
    pub fn from_oid<T: AsRef<[u8]>>(oid: &Oid<T>) -> Option<Self> {
        Self::KNOWN.iter().find(|item| item.0 == *oid).map(|item| item.1)
    }

    /// Returns the name of the algorithm as used in the index.
    pub fn as_str(self) -> &'static str {
        match self {
            PublicKeyAlgorithm::Rsa => "rsaEncryption",
            PublicKeyAlgorithm::RsaPss => "rsassaPss",
            PublicKeyAlgorithm::Dsa => "dsaEncryption",
            PublicKeyAlgorithm::Ec => "id-ecPublicKey",
            PublicKeyAlgorithm::Ed25519 => "ED25519",
            PublicKeyAlgorithm::Ed448 => "ED448",
            PublicKeyAlgorithm::X25519 => "X25519",
            PublicKeyAlgorithm::X448 => "X448",
        }
    }
}

impl fmt::Display for PublicKeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ Curve ---------------------------------------------------------

/// A named elliptic curve.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Curve {
    Prime192v1,
    Secp224r1,
    Prime256v1,
    Secp256k1,
    Secp384r1,
    Secp521r1,
    BrainpoolP256r1,
    BrainpoolP384r1,
    BrainpoolP512r1,
}

impl Curve {
    const KNOWN: &'static [(Oid<&'static [u8]>, Self)] = &[
        // 1.2.840.10045.3.1.1
        (Oid(&[42, 134, 72, 206, 61, 3, 1, 1]), Curve::Prime192v1),
        // 1.3.132.0.33
        (Oid(&[43, 129, 4, 0, 33]), Curve::Secp224r1),
        // 1.2.840.10045.3.1.7
        (Oid(&[42, 134, 72, 206, 61, 3, 1, 7]), Curve::Prime256v1),
        // 1.3.132.0.10
        (Oid(&[43, 129, 4, 0, 10]), Curve::Secp256k1),
        // 1.3.132.0.34
        (Oid(&[43, 129, 4, 0, 34]), Curve::Secp384r1),
        // 1.3.132.0.35
        (Oid(&[43, 129, 4, 0, 35]), Curve::Secp521r1),
        // 1.3.36.3.3.2.8.1.1.7
        (Oid(&[43, 36, 3, 3, 2, 8, 1, 1, 7]), Curve::BrainpoolP256r1),
        // 1.3.36.3.3.2.8.1.1.11
        (Oid(&[43, 36, 3, 3, 2, 8, 1, 1, 11]), Curve::BrainpoolP384r1),
        // 1.3.36.3.3.2.8.1.1.13
        (Oid(&[43, 36, 3, 3, 2, 8, 1, 1, 13]), Curve::BrainpoolP512r1),
    ];

    /// Looks up the curve for an object identifier.
    pub fn from_oid<T: AsRef<[u8]>>(oid: &Oid<T>) -> Option<Self> {
        Self::KNOWN.iter().find(|item| item.0 == *oid).map(|item| item.1)
    }

    /// Returns the name of the curve as used in the index.
    pub fn as_str(self) -> &'static str {
        match self {
            Curve::Prime192v1 => "prime192v1",
            Curve::Secp224r1 => "secp224r1",
            Curve::Prime256v1 => "prime256v1",
            Curve::Secp256k1 => "secp256k1",
            Curve::Secp384r1 => "secp384r1",
            Curve::Secp521r1 => "secp521r1",
            Curve::BrainpoolP256r1 => "brainpoolP256r1",
            Curve::BrainpoolP384r1 => "brainpoolP384r1",
            Curve::BrainpoolP512r1 => "brainpoolP512r1",
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn lookup() {
        let oid = Oid(Bytes::from_static(&[42, 134, 72, 206, 61, 2, 1]));
        assert_eq!(
            PublicKeyAlgorithm::from_oid(&oid), Some(PublicKeyAlgorithm::Ec)
        );
        assert_eq!(Curve::from_oid(&oid), None);
        assert_eq!(
            Curve::from_oid(&Oid(&[43u8, 129, 4, 0, 34][..])),
            Some(Curve::Secp384r1)
        );
        assert_eq!(PublicKeyAlgorithm::from_oid(&Oid(&b"\x2b"[..])), None);
    }

    #[test]
    fn names() {
        assert_eq!(PublicKeyAlgorithm::Rsa.to_string(), "rsaEncryption");
        assert_eq!(Curve::Prime256v1.to_string(), "prime256v1");
    }
}
