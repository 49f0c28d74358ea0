//! Value type parsers for iCalendar (RFC 5545 §3.3).

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{Date, DateTime, DateTimeForm, Duration};

fn digits<T: std::str::FromStr>(
    s: &str,
    kind: ParseErrorKind,
    line: usize,
    col: usize,
) -> ParseResult<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::new(kind, line, col));
    }
    s.parse::<T>()
        .map_err(|_err| ParseError::new(kind, line, col))
}

/// Parses a DATE value (RFC 5545 §3.3.4).
///
/// Format: YYYYMMDD (e.g., "19970714")
///
/// ## Errors
/// Returns an error if the string is not a valid 8-digit date.
pub fn parse_date(s: &str, line: usize, col: usize) -> ParseResult<Date> {
    let kind = ParseErrorKind::InvalidDate;
    if s.len() != 8 || !s.is_ascii() {
        return Err(ParseError::new(kind, line, col));
    }

    let year = digits::<u16>(&s[0..4], kind, line, col)?;
    let month = digits::<u8>(&s[4..6], kind, line, col)?;
    let day = digits::<u8>(&s[6..8], kind, line, col)?;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(ParseError::new(kind, line, col));
    }

    Ok(Date { year, month, day })
}

/// Parses a DATE-TIME value (RFC 5545 §3.3.5).
///
/// Format: YYYYMMDD"T"HHMMSS[Z] (e.g., "19970714T133000Z")
///
/// The TZID comes from the property parameter; a trailing `Z` wins over it.
///
/// ## Errors
/// Returns an error if the string is not a valid datetime format.
pub fn parse_datetime(
    s: &str,
    tzid: Option<&str>,
    line: usize,
    col: usize,
) -> ParseResult<DateTime> {
    let kind = ParseErrorKind::InvalidDateTime;
    let (date_str, time_str) = s
        .split_once(['T', 't'])
        .ok_or_else(|| ParseError::new(kind, line, col))?;

    let date = parse_date(date_str, line, col)?;

    let (time_str, is_utc) = match time_str.strip_suffix(['Z', 'z']) {
        Some(stripped) => (stripped, true),
        None => (time_str, false),
    };
    if time_str.len() != 6 || !time_str.is_ascii() {
        return Err(ParseError::new(ParseErrorKind::InvalidTime, line, col + 9));
    }

    let time_kind = ParseErrorKind::InvalidTime;
    let hour = digits::<u8>(&time_str[0..2], time_kind, line, col + 9)?;
    let minute = digits::<u8>(&time_str[2..4], time_kind, line, col + 11)?;
    let second = digits::<u8>(&time_str[4..6], time_kind, line, col + 13)?;

    // 60 is allowed for leap seconds
    if hour > 23 || minute > 59 || second > 60 {
        return Err(ParseError::new(time_kind, line, col + 9));
    }

    let form = if is_utc {
        DateTimeForm::Utc
    } else if let Some(tz) = tzid {
        DateTimeForm::Zoned {
            tzid: tz.to_string(),
        }
    } else {
        DateTimeForm::Floating
    };

    Ok(DateTime {
        year: date.year,
        month: date.month,
        day: date.day,
        hour,
        minute,
        second,
        form,
    })
}

/// Parses a UTC-OFFSET value (RFC 5545 §3.3.14) into seconds east of UTC.
///
/// Format: (+|-)HHMM[SS] (e.g., "+0530", "-0800")
///
/// ## Errors
/// Returns an error if the string is not a valid UTC offset format.
pub fn parse_utc_offset(s: &str, line: usize, col: usize) -> ParseResult<i32> {
    let kind = ParseErrorKind::InvalidUtcOffset;
    if !s.is_ascii() || (s.len() != 5 && s.len() != 7) {
        return Err(ParseError::new(kind, line, col));
    }

    let sign = match &s[..1] {
        "+" => 1,
        "-" => -1,
        _ => return Err(ParseError::new(kind, line, col)),
    };

    let hours = digits::<i32>(&s[1..3], kind, line, col)?;
    let minutes = digits::<i32>(&s[3..5], kind, line, col)?;
    let seconds = if s.len() == 7 {
        digits::<i32>(&s[5..7], kind, line, col)?
    } else {
        0
    };

    if minutes > 59 || seconds > 59 {
        return Err(ParseError::new(kind, line, col));
    }

    Ok(sign * (hours * 3600 + minutes * 60 + seconds))
}

/// Parses a DURATION value (RFC 5545 §3.3.6).
///
/// Format: [+|-]P[nW] or [+|-]P[nD][T[nH][nM][nS]]
///
/// ## Errors
/// Returns an error if the string is not a valid duration format.
pub fn parse_duration(s: &str, line: usize, col: usize) -> ParseResult<Duration> {
    let err = || ParseError::new(ParseErrorKind::InvalidDuration, line, col);

    let mut dur = Duration::zero();
    let rest = if let Some(r) = s.strip_prefix('-') {
        dur.negative = true;
        r
    } else {
        s.strip_prefix('+').unwrap_or(s)
    };

    let rest = rest.strip_prefix(['P', 'p']).ok_or_else(err)?;
    if rest.is_empty() {
        return Err(err());
    }

    let mut in_time = false;
    let mut seen_any = false;
    let mut number = String::new();

    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }

        let designator = c.to_ascii_uppercase();
        if designator == 'T' {
            if in_time || !number.is_empty() {
                return Err(err());
            }
            in_time = true;
            continue;
        }

        let n: u32 = number.parse().map_err(|_err| err())?;
        number.clear();
        seen_any = true;

        match (designator, in_time) {
            ('W', false) => dur.weeks = n,
            ('D', false) => dur.days = n,
            ('H', true) => dur.hours = n,
            ('M', true) => dur.minutes = n,
            ('S', true) => dur.seconds = n,
            _ => return Err(err()),
        }
    }

    if !number.is_empty() || !seen_any {
        return Err(err());
    }

    Ok(dur)
}

/// Parses an INTEGER value (RFC 5545 §3.3.8).
///
/// ## Errors
/// Returns an error if the string is not a valid integer.
pub fn parse_integer(s: &str, line: usize, col: usize) -> ParseResult<i32> {
    s.trim()
        .parse::<i32>()
        .map_err(|_err| ParseError::new(ParseErrorKind::InvalidInteger, line, col))
}

/// Unescapes a TEXT value (RFC 5545 §3.3.11).
///
/// Unknown escapes are preserved as-is.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n' | 'N') => result.push('\n'),
                Some(',') => result.push(','),
                Some(';') => result.push(';'),
                Some('\\') | None => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Splits a comma-separated TEXT list on unescaped commas and unescapes
/// each item.
#[must_use]
pub fn split_text_list(s: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => items.push(unescape_text(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    items.push(unescape_text(&current));

    items
}
