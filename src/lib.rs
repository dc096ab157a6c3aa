//! The certinfo library.
//!
//! This crate extracts the indexable fields from X.509 certificates seen
//! in TLS handshakes and keeps a single shared record for every distinct
//! certificate no matter how many sessions it shows up in.
//!
//! The pieces, from the bottom up:
//!
//! * [`ber`] is a bounded, streaming BER/DER decoder,
//! * [`cert`] walks a certificate and produces a [`CertInfo`], with the
//!   help of [`name`], [`time`], [`algorithm`], [`strlist`], and
//!   [`extra`],
//! * [`cache`] deduplicates records and counts references to them,
//! * [`output`] writes records through a [`FieldWriter`][output::FieldWriter],
//! * [`handshake`] picks certificates out of TLS handshake messages.
//!
//! The `certinfo` binary, via `main.rs`, is only a very tiny frontend to
//! [`operation`].

#[macro_use] mod debug;

pub use self::cache::{CertCache, CertRef};
pub use self::cert::{CertInfo, Decoded, DecodeError, DecodeStatus};
pub use self::config::Config;
pub use self::error::{ExitError, Failed};
pub use self::operation::Operation;

pub mod algorithm;
pub mod ber;
pub mod cache;
pub mod cert;
pub mod config;
pub mod error;
pub mod extra;
pub mod handshake;
pub mod log;
pub mod name;
pub mod operation;
pub mod output;
pub mod strlist;
pub mod time;
pub mod utils;
