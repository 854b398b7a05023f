//! Parsing for the loosely ISO 8601 timestamps the changelog endpoint hands
//! us.  The database layer behind the endpoint is not consistent about the
//! separator between date and time, about whether seconds are present, or
//! about how many fractional digits it emits, so we accept:
//!
//! `YYYY-MM-DD[T ]HH:MM[:SS[(.|,)fraction]][Z|±HH[:MM]]`
//!
//! Everything is read positionally.  A timestamp without an offset marker is
//! interpreted as UTC.  Once parsed we only keep the absolute instant; the
//! offset the server used is applied and then forgotten.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("timestamp {input:?} ends early, expected {expected} at offset {offset}")]
    Truncated {
        input: String,
        offset: usize,
        expected: &'static str,
    },
    #[error("timestamp {input:?} has unexpected character at offset {offset}, expected {expected}")]
    Unexpected {
        input: String,
        offset: usize,
        expected: &'static str,
    },
    #[error("timestamp {input:?} has a {field} value out of range")]
    OutOfRange { input: String, field: &'static str },
}

struct Cursor<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn truncated(&self, expected: &'static str) -> TimestampError {
        TimestampError::Truncated {
            input: self.input.to_string(),
            offset: self.pos,
            expected,
        }
    }

    fn unexpected(&self, expected: &'static str) -> TimestampError {
        TimestampError::Unexpected {
            input: self.input.to_string(),
            offset: self.pos,
            expected,
        }
    }

    fn out_of_range(&self, field: &'static str) -> TimestampError {
        TimestampError::OutOfRange {
            input: self.input.to_string(),
            field,
        }
    }

    /// Consume exactly `count` ASCII digits.
    fn digits(&mut self, count: usize) -> Result<u32, TimestampError> {
        let mut value = 0u32;
        for _ in 0..count {
            match self.peek() {
                None => return Err(self.truncated("a digit")),
                Some(b) if b.is_ascii_digit() => {
                    value = value * 10 + u32::from(b - b'0');
                    self.pos += 1;
                }
                Some(_) => return Err(self.unexpected("a digit")),
            }
        }
        Ok(value)
    }

    /// Consume one byte out of `allowed`.
    fn one_of(&mut self, allowed: &[u8], expected: &'static str) -> Result<u8, TimestampError> {
        match self.peek() {
            None => Err(self.truncated(expected)),
            Some(b) if allowed.contains(&b) => {
                self.pos += 1;
                Ok(b)
            }
            Some(_) => Err(self.unexpected(expected)),
        }
    }

    /// Consume a run of fraction digits, normalized to microseconds.  Digits
    /// past the sixth are consumed but ignored.
    fn fraction_micros(&mut self) -> Result<u32, TimestampError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                None => Err(self.truncated("fraction digits")),
                Some(_) => Err(self.unexpected("fraction digits")),
            };
        }
        let mut micros = 0u32;
        for i in 0..6 {
            let digit = match self.bytes.get(start + i) {
                Some(b) if start + i < self.pos => u32::from(b - b'0'),
                _ => 0,
            };
            micros = micros * 10 + digit;
        }
        Ok(micros)
    }

    /// Parse the `Z` / `±HH[:MM]` suffix into an offset east of UTC in
    /// minutes.  No suffix at all means UTC.
    fn offset_minutes(&mut self) -> Result<i64, TimestampError> {
        let sign = match self.peek() {
            None => return Ok(0),
            Some(b'Z') | Some(b'z') => {
                self.pos += 1;
                return Ok(0);
            }
            Some(b'+') => 1,
            Some(b'-') => -1,
            Some(_) => return Err(self.unexpected("'Z' or a UTC offset")),
        };
        self.pos += 1;
        let hours = self.digits(2)?;
        let minutes = match self.peek() {
            None => 0,
            Some(b':') => {
                self.pos += 1;
                self.digits(2)?
            }
            Some(b) if b.is_ascii_digit() => self.digits(2)?,
            Some(_) => return Err(self.unexpected("offset minutes")),
        };
        if hours > 23 {
            return Err(self.out_of_range("offset hour"));
        }
        if minutes > 59 {
            return Err(self.out_of_range("offset minute"));
        }
        Ok(sign * i64::from(hours * 60 + minutes))
    }
}

/// Parse a changelog timestamp into an absolute instant.
///
/// The sub-second fraction is truncated or zero-padded to six digits and then
/// converted to milliseconds as `(micros + 499) / 1000`, which can carry into
/// the next second.
pub fn parse_iso_timestamp(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    let mut cur = Cursor::new(input);

    let year = cur.digits(4)?;
    cur.one_of(b"-", "'-'")?;
    let month = cur.digits(2)?;
    cur.one_of(b"-", "'-'")?;
    let day = cur.digits(2)?;
    cur.one_of(b"Tt ", "'T' or ' '")?;
    let hour = cur.digits(2)?;
    cur.one_of(b":", "':'")?;
    let minute = cur.digits(2)?;

    let mut second = 0;
    let mut micros = 0;
    if cur.peek() == Some(b':') {
        cur.pos += 1;
        second = cur.digits(2)?;
        if matches!(cur.peek(), Some(b'.') | Some(b',')) {
            cur.pos += 1;
            micros = cur.fraction_micros()?;
        }
    }

    let offset = cur.offset_minutes()?;
    if cur.peek().is_some() {
        return Err(cur.unexpected("end of timestamp"));
    }

    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(|| cur.out_of_range("date"))?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| cur.out_of_range("time"))?;
    let naive = NaiveDateTime::new(date, time);

    let millis = (micros + 499) / 1000;
    Ok(Utc.from_utc_datetime(&naive) + Duration::milliseconds(i64::from(millis))
        - Duration::minutes(offset))
}

/// Serialize an instant as `YYYY-MM-DDTHH:MM:SS[.mmm]Z`; the fraction only
/// appears when it is non-zero.
pub fn format_iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
