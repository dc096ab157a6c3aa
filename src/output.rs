//! Output of certificate records.
//!
//! Records are handed to the indexer through a [`FieldWriter`], the
//! interface of its field-output framework. The function [`save`] writes
//! all populated fields of a record. Fields that have no value are left
//! out entirely rather than written empty.
//!
//! A [`JsonWriter`] that produces one compact JSON object per record is
//! provided for use outside of the indexer.

use std::io;
use std::borrow::Cow;
use chrono::Utc;
use crate::cert::CertInfo;
use crate::extra::ExtraValue;
use crate::name::CertName;
use crate::strlist::StringList;


//------------ SessionTime ---------------------------------------------------

/// The reference time of the session a record is written for.
///
/// The remaining validity of a certificate is relative to this time.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct SessionTime {
    /// Seconds since the Unix epoch.
    seconds: i64,
}

impl SessionTime {
    /// Creates a session time from seconds since the Unix epoch.
    pub fn from_epoch(seconds: i64) -> Self {
        SessionTime { seconds }
    }

    /// Creates a session time for right now.
    pub fn now() -> Self {
        Self::from_epoch(Utc::now().timestamp())
    }

    pub fn epoch(self) -> i64 {
        self.seconds
    }
}


//------------ FieldWriter ---------------------------------------------------

/// A writer for nested field objects.
///
/// Objects are opened with [`begin_object`] and closed with [`end_object`].
/// The outermost object has no key, all nested objects and values do.
///
/// [`begin_object`]: #tymethod.begin_object
/// [`end_object`]: #tymethod.end_object
pub trait FieldWriter {
    /// Opens a new object.
    fn begin_object(&mut self, key: Option<&str>) -> Result<(), io::Error>;

    /// Closes the most recently opened object.
    fn end_object(&mut self) -> Result<(), io::Error>;

    /// Writes a string value.
    fn write_str(&mut self, key: &str, value: &str) -> Result<(), io::Error>;

    /// Writes an integer value.
    fn write_int(&mut self, key: &str, value: i64) -> Result<(), io::Error>;

    /// Writes a boolean value.
    fn write_bool(&mut self, key: &str, value: bool) -> Result<(), io::Error>;

    /// Writes an array of strings.
    fn write_str_array(
        &mut self, key: &str, values: &[Cow<str>]
    ) -> Result<(), io::Error>;
}


//------------ save ----------------------------------------------------------

/// Writes a certificate record as an object of its own.
pub fn save<W: FieldWriter + ?Sized>(
    writer: &mut W, cert: &CertInfo, session: SessionTime,
) -> Result<(), io::Error> {
    writer.begin_object(None)?;
    save_fields(writer, cert, session)?;
    writer.end_object()
}

/// Writes the fields of a certificate record into the current object.
pub fn save_fields<W: FieldWriter + ?Sized>(
    writer: &mut W, cert: &CertInfo, session: SessionTime,
) -> Result<(), io::Error> {
    writer.write_str("hash", &cert.hash.to_string())?;
    if let Some(algorithm) = cert.public_algorithm {
        writer.write_str("publicAlgorithm", algorithm.as_str())?;
    }
    if let Some(curve) = cert.curve {
        writer.write_str("curve", curve.as_str())?;
    }

    save_name(writer, "issuer", &cert.issuer)?;
    save_name(writer, "subject", &cert.subject)?;

    if !cert.alt.is_empty() {
        save_list(writer, "alt", &cert.alt)?;
        writer.write_int("altCnt", cert.alt.len() as i64)?;
    }

    if !cert.serial_number.is_empty() {
        let serial = cert.serial_number.iter().map(|octet| {
            format!("{:02x}", octet)
        }).collect::<String>();
        writer.write_str("serial", &serial)?;
    }

    if cert.not_before != 0 {
        writer.write_int("notBefore", cert.not_before)?;
    }
    if cert.not_after != 0 {
        writer.write_int("notAfter", cert.not_after)?;
    }
    if cert.not_before != 0 && cert.not_after > cert.not_before {
        let valid = cert.not_after - cert.not_before;
        writer.write_int("validSeconds", valid)?;
        writer.write_int("validDays", valid / 86_400)?;
    }
    if cert.not_after != 0 {
        let remaining = cert.not_after.saturating_sub(session.epoch());
        if remaining > 0 {
            writer.write_int("remainingSeconds", remaining)?;
            writer.write_int("remainingDays", remaining / 86_400)?;
        }
    }

    if cert.is_ca {
        writer.write_bool("isCA", true)?;
    }

    if !cert.extra.is_empty() {
        writer.begin_object(Some("extra"))?;
        for (key, value) in cert.extra.iter() {
            match *value {
                ExtraValue::Str(ref value) => {
                    writer.write_str(key.name(), value)?
                }
                ExtraValue::Int(value) => {
                    writer.write_int(key.name(), value)?
                }
                ExtraValue::Bytes(ref value) => {
                    writer.write_str(key.name(), &hex_colon(value))?
                }
            }
        }
        writer.end_object()?;
    }
    Ok(())
}

/// Writes the fields of a name with the given prefix.
fn save_name<W: FieldWriter + ?Sized>(
    writer: &mut W, prefix: &str, name: &CertName
) -> Result<(), io::Error> {
    for (suffix, list) in [
        ("CN", &name.common_name),
        ("ON", &name.org_name),
        ("OU", &name.org_unit),
    ] {
        if !list.is_empty() {
            save_list(writer, &format!("{}{}", prefix, suffix), list)?;
        }
    }
    Ok(())
}

fn save_list<W: FieldWriter + ?Sized>(
    writer: &mut W, key: &str, list: &StringList
) -> Result<(), io::Error> {
    writer.write_str_array(key, &list.iter_str().collect::<Vec<_>>())
}

/// Formats octets as colon separated lower-case hex.
fn hex_colon(octets: &[u8]) -> String {
    octets.iter().map(|octet| {
        format!("{:02x}", octet)
    }).collect::<Vec<_>>().join(":")
}


//------------ JsonWriter ----------------------------------------------------

/// A field writer producing compact JSON.
///
/// Each outermost object is written on a line of its own.
pub struct JsonWriter<W> {
    /// Where the JSON goes.
    target: W,

    /// For each open object, whether nothing has been written to it yet.
    empty: Vec<bool>,
}

impl<W: io::Write> JsonWriter<W> {
    pub fn new(target: W) -> Self {
        JsonWriter { target, empty: Vec::new() }
    }

    pub fn into_inner(self) -> W {
        self.target
    }

    fn append_separator(&mut self) -> Result<(), io::Error> {
        match self.empty.last_mut() {
            Some(empty) if *empty => {
                *empty = false;
                Ok(())
            }
            Some(_) => self.target.write_all(b","),
            None => Ok(())
        }
    }

    fn append_key(&mut self, key: &str) -> Result<(), io::Error> {
        self.append_separator()?;
        serde_json::to_writer(&mut self.target, key)?;
        self.target.write_all(b":")
    }
}

impl<W: io::Write> FieldWriter for JsonWriter<W> {
    fn begin_object(&mut self, key: Option<&str>) -> Result<(), io::Error> {
        match key {
            Some(key) => self.append_key(key)?,
            None => self.append_separator()?,
        }
        self.empty.push(true);
        self.target.write_all(b"{")
    }

    fn end_object(&mut self) -> Result<(), io::Error> {
        self.empty.pop();
        self.target.write_all(b"}")?;
        if self.empty.is_empty() {
            self.target.write_all(b"\n")?;
        }
        Ok(())
    }

    fn write_str(&mut self, key: &str, value: &str) -> Result<(), io::Error> {
        self.append_key(key)?;
        serde_json::to_writer(&mut self.target, value)?;
        Ok(())
    }

    fn write_int(&mut self, key: &str, value: i64) -> Result<(), io::Error> {
        self.append_key(key)?;
        write!(self.target, "{}", value)
    }

    fn write_bool(&mut self, key: &str, value: bool) -> Result<(), io::Error> {
        self.append_key(key)?;
        self.target.write_all(if value { b"true" } else { b"false" })
    }

    fn write_str_array(
        &mut self, key: &str, values: &[Cow<str>]
    ) -> Result<(), io::Error> {
        self.append_key(key)?;
        serde_json::to_writer(&mut self.target, values)?;
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use crate::algorithm::{Curve, PublicKeyAlgorithm};
    use crate::extra::ExtraKey;
    use crate::test::TestCert;

    /// A field writer that remembers the keys it was given.
    #[derive(Default)]
    struct KeyWriter {
        keys: Vec<String>,
    }

    impl FieldWriter for KeyWriter {
        fn begin_object(&mut self, key: Option<&str>) -> Result<(), io::Error> {
            if let Some(key) = key {
                self.keys.push(key.into())
            }
            Ok(())
        }

        fn end_object(&mut self) -> Result<(), io::Error> {
            Ok(())
        }

        fn write_str(&mut self, key: &str, _: &str) -> Result<(), io::Error> {
            self.keys.push(key.into());
            Ok(())
        }

        fn write_int(&mut self, key: &str, _: i64) -> Result<(), io::Error> {
            self.keys.push(key.into());
            Ok(())
        }

        fn write_bool(&mut self, key: &str, _: bool) -> Result<(), io::Error> {
            self.keys.push(key.into());
            Ok(())
        }

        fn write_str_array(
            &mut self, key: &str, _: &[Cow<str>]
        ) -> Result<(), io::Error> {
            self.keys.push(key.into());
            Ok(())
        }
    }

    fn keys(cert: &CertInfo, now: i64) -> Vec<String> {
        let mut writer = KeyWriter::default();
        save(&mut writer, cert, SessionTime::from_epoch(now)).unwrap();
        writer.keys
    }

    fn json(cert: &CertInfo, now: i64) -> String {
        let mut writer = JsonWriter::new(Vec::new());
        save(&mut writer, cert, SessionTime::from_epoch(now)).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn empty_record() {
        assert_eq!(keys(&CertInfo::new(), 0), ["hash"]);
    }

    #[test]
    fn empty_alt_is_omitted() {
        let cert = CertInfo::decode(TestCert::default().to_bytes()).unwrap();
        let keys = keys(&cert.cert, 0);
        assert!(!keys.iter().any(|key| key == "alt" || key == "altCnt"));
        assert!(!keys.iter().any(|key| key == "isCA"));
        assert!(keys.iter().any(|key| key == "subjectOU"));
        assert!(!keys.iter().any(|key| key == "issuerOU"));
    }

    #[test]
    fn full_record() {
        let mut cert = CertInfo::new();
        cert.hash = [0xab; 20].into();
        cert.public_algorithm = Some(PublicKeyAlgorithm::Ec);
        cert.curve = Some(Curve::Prime256v1);
        cert.issuer.common_name.push(&b"example ca"[..]);
        cert.subject.common_name.push(&b"www.example.com"[..]);
        cert.subject.org_unit.push(&b"Web"[..]);
        cert.subject.org_unit.push(&b"Ops"[..]);
        cert.alt.push(&b"www.example.com"[..]);
        cert.alt.push(&b"192.0.2.1"[..]);
        cert.serial_number = Bytes::from_static(&[0x00, 0xfe, 0x01]);
        cert.not_before = 1_000_000;
        cert.not_after = 1_000_000 + 3 * 86_400 + 5;
        cert.is_ca = true;
        cert.extra.insert(ExtraKey::PathLength, ExtraValue::Int(0));
        cert.extra.insert(
            ExtraKey::SubjectKeyId,
            ExtraValue::Bytes(Bytes::from_static(&[0x01, 0xa2]))
        );
        assert_eq!(
            json(&cert, 1_000_000 + 86_400),
            format!(
                "{{\"hash\":\"{}\",\
                \"publicAlgorithm\":\"id-ecPublicKey\",\
                \"curve\":\"prime256v1\",\
                \"issuerCN\":[\"example ca\"],\
                \"subjectCN\":[\"www.example.com\"],\
                \"subjectOU\":[\"Web\",\"Ops\"],\
                \"alt\":[\"www.example.com\",\"192.0.2.1\"],\
                \"altCnt\":2,\
                \"serial\":\"00fe01\",\
                \"notBefore\":1000000,\
                \"notAfter\":1259205,\
                \"validSeconds\":259205,\
                \"validDays\":3,\
                \"remainingSeconds\":172805,\
                \"remainingDays\":2,\
                \"isCA\":true,\
                \"extra\":{{\"pathLen\":0,\"subjectKeyId\":\"01:a2\"}}}}\n",
                ["ab"; 20].join(":")
            )
        );
    }

    #[test]
    fn expired_has_no_remaining() {
        let mut cert = CertInfo::new();
        cert.not_before = 1_000;
        cert.not_after = 2_000;
        assert_eq!(
            keys(&cert, 5_000),
            ["hash", "notBefore", "notAfter", "validSeconds", "validDays"]
        );
    }

    #[test]
    fn latin1_names() {
        let mut cert = CertInfo::new();
        cert.subject.org_name.push(&b"Caf\xe9 \"Paris\""[..]);
        cert.subject.utf8 = false;
        let json = json(&cert, 0);
        assert!(json.contains("\"subjectON\":[\"Caf\u{e9} \\\"Paris\\\"\"]"));
    }

    #[test]
    fn several_objects() {
        let mut writer = JsonWriter::new(Vec::new());
        let cert = CertInfo::new();
        save(&mut writer, &cert, SessionTime::from_epoch(0)).unwrap();
        writer.begin_object(None).unwrap();
        writer.write_str("file", "a.der").unwrap();
        writer.begin_object(Some("cert")).unwrap();
        save_fields(&mut writer, &cert, SessionTime::from_epoch(0)).unwrap();
        writer.end_object().unwrap();
        writer.end_object().unwrap();
        let hash = ["00"; 20].join(":");
        assert_eq!(
            String::from_utf8(writer.into_inner()).unwrap(),
            format!(
                "{{\"hash\":\"{0}\"}}\n\
                {{\"file\":\"a.der\",\"cert\":{{\"hash\":\"{0}\"}}}}\n",
                hash
            )
        );
    }
}
