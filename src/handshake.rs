//! Certificates in TLS handshakes.
//!
//! The session layer hands us certificates as they appear in the
//! `Certificate` handshake message of TLS up to version 1.2:
//!
//! ```text
//! opaque ASN.1Cert<1..2^24-1>;
//!
//! struct {
//!     ASN.1Cert certificate_list<0..2^24-1>;
//! } Certificate;
//! ```
//!
//! Captured data is frequently cut short. Lengths that claim more than
//! there is are therefore cut down to the available data instead of
//! rejecting the message, so that the decoder gets a chance at whatever
//! was captured.

use bytes::{Buf, Bytes};


/// The content type of a TLS handshake record.
const CONTENT_TYPE_HANDSHAKE: u8 = 22;

/// The handshake type of a Certificate message.
const HANDSHAKE_TYPE_CERTIFICATE: u8 = 11;


//------------ CertificateList -----------------------------------------------

/// An iterator over the certificates of a Certificate message.
///
/// Each item is the raw DER encoding of one certificate, starting with the
/// end-entity certificate.
#[derive(Clone, Debug)]
pub struct CertificateList {
    data: Bytes,
}

impl CertificateList {
    /// Creates an iterator from the body of a Certificate message.
    ///
    /// The body starts with the three octet length of the list.
    pub fn new(mut body: Bytes) -> Self {
        let len = take_clamped_u24(&mut body);
        body.truncate(len);
        CertificateList { data: body }
    }
}

impl Iterator for CertificateList {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        loop {
            if self.data.len() < 3 {
                return None
            }
            let len = take_clamped_u24(&mut self.data);
            let res = self.data.split_to(len);

            // Empty entries can’t possibly be certificates.
            if !res.is_empty() {
                return Some(res)
            }
        }
    }
}


//------------ CertificateMessages -------------------------------------------

/// An iterator over the Certificate messages in a stream of TLS records.
///
/// Each item is the body of a message and can be given to
/// [`CertificateList::new`]. Records other than handshake records and
/// handshake messages other than Certificate are skipped. Messages that
/// span several records are cut at the end of their first record.
#[derive(Clone, Debug)]
pub struct CertificateMessages {
    /// The records not yet looked at.
    records: Bytes,

    /// The rest of the handshake record currently being looked at.
    record: Bytes,
}

impl CertificateMessages {
    pub fn new(records: Bytes) -> Self {
        CertificateMessages { records, record: Bytes::new() }
    }
}

impl Iterator for CertificateMessages {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        loop {
            if self.record.len() >= 4 {
                let msg_type = self.record.get_u8();
                let len = take_clamped_u24(&mut self.record);
                let body = self.record.split_to(len);
                if msg_type == HANDSHAKE_TYPE_CERTIFICATE {
                    return Some(body)
                }
                continue
            }

            // Content type, version, and length.
            if self.records.len() < 5 {
                return None
            }
            let content_type = self.records.get_u8();
            self.records.advance(2);
            let len = usize::from(self.records.get_u16()).min(
                self.records.len()
            );
            let record = self.records.split_to(len);
            self.record = if content_type == CONTENT_TYPE_HANDSHAKE {
                record
            }
            else {
                Bytes::new()
            };
        }
    }
}


//------------ Helper Functions ----------------------------------------------

/// Takes a three octet length and cuts it down to the remaining data.
///
/// If there are less than three octets, consumes them and returns 0.
fn take_clamped_u24(data: &mut Bytes) -> usize {
    if data.len() < 3 {
        data.clear();
        return 0
    }
    let len = usize::from(data[0]) << 16
        | usize::from(data[1]) << 8
        | usize::from(data[2]);
    data.advance(3);
    len.min(data.len())
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn entry(content: &[u8]) -> Vec<u8> {
        let len = content.len();
        let mut res = vec![(len >> 16) as u8, (len >> 8) as u8, len as u8];
        res.extend_from_slice(content);
        res
    }

    fn body(entries: &[&[u8]]) -> Vec<u8> {
        entry(&entries.iter().map(|item| entry(item)).collect::<Vec<_>>()
            .concat()
        )
    }

    #[test]
    fn two_certificates() {
        let list = CertificateList::new(
            body(&[b"first", b"second"]).into()
        ).collect::<Vec<_>>();
        assert_eq!(list, [&b"first"[..], &b"second"[..]]);
    }

    #[test]
    fn overlong_final_entry() {
        let mut data = body(&[b"first", b"second"]);
        // Claim 0x100 octets for the second entry.
        let pos = data.len() - 6 - 3;
        data[pos + 1] = 1;
        data[pos + 2] = 0;
        let list = CertificateList::new(data.into()).collect::<Vec<_>>();
        assert_eq!(list, [&b"first"[..], &b"second"[..]]);
    }

    #[test]
    fn truncated_body() {
        let mut data = body(&[b"first", b"second"]);
        data.truncate(data.len() - 2);
        let list = CertificateList::new(data.into()).collect::<Vec<_>>();
        assert_eq!(list, [&b"first"[..], &b"seco"[..]]);

        let list = CertificateList::new(
            Bytes::from_static(b"\x00\x00\x09\x00")
        ).collect::<Vec<_>>();
        assert!(list.is_empty());

        assert_eq!(CertificateList::new(Bytes::new()).count(), 0);
    }

    #[test]
    fn empty_entries_are_skipped() {
        let list = CertificateList::new(
            body(&[b"", b"only"]).into()
        ).collect::<Vec<_>>();
        assert_eq!(list, [&b"only"[..]]);
    }

    #[test]
    fn messages_in_records() {
        fn message(msg_type: u8, body: &[u8]) -> Vec<u8> {
            let mut res = vec![msg_type];
            res.extend(entry(body));
            res
        }

        fn record(content_type: u8, content: &[u8]) -> Vec<u8> {
            let len = content.len();
            let mut res = vec![
                content_type, 3, 3, (len >> 8) as u8, len as u8
            ];
            res.extend_from_slice(content);
            res
        }

        let certs = body(&[b"leaf", b"ca"]);
        let data = [
            record(21, &[2, 40]),
            record(22, &[
                message(2, b"server hello"),
                message(11, &certs),
                message(14, b""),
            ].concat()),
        ].concat();
        let messages = CertificateMessages::new(
            data.into()
        ).collect::<Vec<_>>();
        assert_eq!(messages, [certs.as_slice()]);
        assert_eq!(
            CertificateList::new(messages[0].clone()).collect::<Vec<_>>(),
            [&b"leaf"[..], &b"ca"[..]]
        );

        // A record cut short still yields the start of the message.
        let mut data = record(22, &message(11, &certs));
        data.truncate(data.len() - 1);
        let mut messages = CertificateMessages::new(data.into());
        assert_eq!(
            CertificateList::new(messages.next().unwrap()).collect::<Vec<_>>(),
            [&b"leaf"[..], &b"c"[..]]
        );
        assert!(messages.next().is_none());
    }
}
