//! A bounded decoder for BER and DER encoded data.
//!
//! Certificates arrive as ASN.1 values encoded in the _Distinguished
//! Encoding Rules,_ a strict subset of the _Basic Encoding Rules_ defined
//! in ITU recommendation X.690. Every value starts with identifier octets
//! carrying its [`Tag`], followed by length octets and then the content.
//! A value is either [`Primitive`], in which case the content holds the
//! actual data, or [`Constructed`], in which case the content is a
//! sequence of more values.
//!
//! The data we decode here is captured off the wire and therefore entirely
//! untrusted. The decoder never trusts a length octet: a value that claims
//! to be longer than what is left of its parent or of the underlying data
//! is rejected as malformed. Nesting of constructed values is limited to
//! [`MAX_DEPTH`] levels and skipping over a value of definite length never
//! looks inside of it.
//!
//! All actual decoding happens through closures which receive a reference
//! to a value and are supposed to process the value completely. If they
//! return with content of the value still unparsed, an error will occur.
//! Decoding starts with picking a [`Mode`] and handing it the data:
//!
//! ```rust,ignore
//! let serial = Mode::Der.decode(bytes, |cons| {
//!     cons.take_primitive_if(Tag::INTEGER, |prim| prim.take_all())
//! })?;
//! ```
//!
//! Byte sequences are kept as [`Bytes`] values so that parts of a
//! captured certificate can be taken out without copying.
//!
//! [`Bytes`]: bytes::Bytes

pub use self::content::{Content, Constructed, Mode, Primitive, MAX_DEPTH};
pub use self::error::Error;
pub use self::length::Length;
pub use self::oid::Oid;
pub use self::source::{CaptureSource, LimitedSource, Source};
pub use self::tag::Tag;

mod content;
mod error;
mod length;
mod oid;
mod source;
mod tag;

