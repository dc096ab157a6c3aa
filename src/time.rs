//! Certificate validity times.
//!
//! X.509 encodes points in time either as UTCTime with a two digit year or
//! as GeneralizedTime with a four digit year. We convert both into seconds
//! since the Unix epoch. A string we can’t make sense of results in `0`.

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use crate::ber::{Constructed, Error, Source, Tag};


//------------ Validity ------------------------------------------------------

/// Takes a single time value from the beginning of `cons`.
///
/// Both UTCTime and GeneralizedTime are accepted. A time value with content
/// we can’t parse results in the sentinel value `0` rather than an error.
/// Any other value is an error.
pub fn take_time<S: Source>(cons: &mut Constructed<S>) -> Result<i64, S::Err> {
    cons.take_primitive(|tag, prim| {
        let res = match tag {
            Tag::UTC_TIME => parse_utc_time(prim.slice_all()?),
            Tag::GENERALIZED_TIME => parse_generalized_time(prim.slice_all()?),
            _ => xerr!(return Err(Error::Malformed.into()))
        };
        prim.skip_all()?;
        Ok(res.unwrap_or(0))
    })
}

/// Parses a UTCTime value.
///
/// The format is `YYMMDDhhmm[ss]` followed by either `Z` or an offset
/// `+hhmm` or `-hhmm`. Years 00 to 49 are 2000 to 2049, years 50 to 99 are
/// 1950 to 1999.
pub fn parse_utc_time(s: &[u8]) -> Option<i64> {
    let mut s = Digits(s);
    let year = s.take(2)? as i32;
    let year = if year < 50 { year + 2000 } else { year + 1900 };
    finish_time(year, s)
}

/// Parses a GeneralizedTime value.
///
/// The format is `YYYYMMDDhhmm[ss[.fff]]` followed by either `Z` or an
/// offset. Fractional seconds are ignored. A missing time zone is taken to
/// mean UTC.
pub fn parse_generalized_time(s: &[u8]) -> Option<i64> {
    let mut s = Digits(s);
    let year = s.take(4)? as i32;
    finish_time(year, s)
}

/// Parses the part of a time value following the year.
fn finish_time(year: i32, mut s: Digits) -> Option<i64> {
    let month = s.take(2)?;
    let day = s.take(2)?;
    let hour = s.take(2)?;
    let minute = s.take(2)?;
    let second = if s.peek_digit() { s.take(2)? } else { 0 };
    if s.peek() == Some(b'.') {
        s.skip(1);
        if !s.peek_digit() {
            return None
        }
        while s.peek_digit() {
            s.skip(1)
        }
    }
    let offset = match s.peek() {
        None => 0,
        Some(b'Z') => {
            s.skip(1);
            0
        }
        Some(sign @ b'+') | Some(sign @ b'-') => {
            s.skip(1);
            let hours = s.take(2)? as i32;
            let minutes = s.take(2)? as i32;
            if hours > 23 || minutes > 59 {
                return None
            }
            let offset = hours * 3600 + minutes * 60;
            if sign == b'-' { -offset } else { offset }
        }
        Some(_) => return None,
    };
    if !s.is_empty() {
        return None
    }

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(
        hour, minute, second
    )?;
    let local = FixedOffset::east_opt(offset)?.from_local_datetime(
        &naive
    ).single()?;
    Some(local.with_timezone(&Utc).timestamp())
}


//------------ Digits --------------------------------------------------------

/// A helper for picking decimal digits off a time string.
struct Digits<'a>(&'a [u8]);

impl<'a> Digits<'a> {
    fn take(&mut self, count: usize) -> Option<u32> {
        if self.0.len() < count {
            return None
        }
        let (head, tail) = self.0.split_at(count);
        let mut res = 0;
        for &ch in head {
            if !ch.is_ascii_digit() {
                return None
            }
            res = res * 10 + (ch - b'0') as u32;
        }
        self.0 = tail;
        Some(res)
    }

    fn peek(&self) -> Option<u8> {
        self.0.first().copied()
    }

    fn peek_digit(&self) -> bool {
        matches!(self.peek(), Some(ch) if ch.is_ascii_digit())
    }

    fn skip(&mut self, count: usize) {
        self.0 = &self.0[count.min(self.0.len())..];
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn utc_time() {
        assert_eq!(parse_utc_time(b"700101000000Z"), Some(0));
        assert_eq!(parse_utc_time(b"000101000000Z"), Some(946684800));
        assert_eq!(parse_utc_time(b"491231235959Z"), Some(2524607999));
        assert_eq!(parse_utc_time(b"500101000000Z"), Some(-631152000));
        assert_eq!(parse_utc_time(b"0001010000Z"), Some(946684800));
        assert_eq!(parse_utc_time(b"000101010000+0100"), Some(946684800));
    }

    #[test]
    fn generalized_time() {
        assert_eq!(parse_generalized_time(b"20500101000000Z"), Some(2524608000));
        assert_eq!(
            parse_generalized_time(b"20000101000000.123Z"), Some(946684800)
        );
        assert_eq!(parse_generalized_time(b"20000101000000"), Some(946684800));
    }

    #[test]
    fn malformed() {
        assert_eq!(parse_utc_time(b""), None);
        assert_eq!(parse_utc_time(b"001301000000Z"), None);
        assert_eq!(parse_utc_time(b"000101000000"), Some(946684800));
        assert_eq!(parse_utc_time(b"000101000000Zjunk"), None);
        assert_eq!(parse_utc_time(b"0001O1000000Z"), None);
        assert_eq!(parse_generalized_time(b"20000101000000.Z"), None);
        assert_eq!(parse_generalized_time(b"20000230000000Z"), None);
    }

    #[test]
    fn take_time_sentinel() {
        use bytes::Bytes;
        use crate::ber::Mode;

        let res = Mode::Der.decode(
            Bytes::from_static(b"\x17\x0d991231235959Z\x17\x03bad"),
            |cons| Ok((take_time(cons)?, take_time(cons)?))
        );
        assert_eq!(res, Ok((946684799, 0)));
        assert!(Mode::Der.decode(
            Bytes::from_static(b"\x04\x01\x00"), take_time
        ).is_err());
    }
}
