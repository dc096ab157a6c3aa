//! The error produced by the decoder.

use std::{error, fmt};


//------------ Error ---------------------------------------------------------

/// Decoding the data failed.
///
/// The decoder deliberately reports very little about the cause. Data
/// either violates the encoding rules or it uses a feature we don’t
/// support.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// The data is not correctly encoded.
    Malformed,

    /// The data uses an encoding feature we don’t support.
    Unimplemented,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Error::Malformed => "malformed data",
            Error::Unimplemented => "unsupported encoding",
        })
    }
}

impl error::Error for Error { }

