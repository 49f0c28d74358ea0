//! Typed property values (RFC 5545 §3.3).

use super::{Date, DateTime, Duration};

/// A parsed property value.
///
/// Values the parser does not type are kept verbatim in `Unknown` so they
/// serialize back exactly as read.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// TEXT, stored unescaped.
    Text(String),
    /// Comma-separated TEXT such as CATEGORIES, each item unescaped.
    TextList(Vec<String>),
    DateTime(DateTime),
    Date(Date),
    DateTimeList(Vec<DateTime>),
    DateList(Vec<Date>),
    Duration(Duration),
    Integer(i32),
    /// UTC-OFFSET in seconds east of UTC.
    UtcOffset(i32),
    /// BINARY, stored decoded.
    Binary(Vec<u8>),
    /// RECUR, kept in its textual form.
    Recur(String),
    Unknown(String),
}

impl Value {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_datetime(&self) -> Option<&DateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_date(&self) -> Option<&Date> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_datetime_list(&self) -> Option<&[DateTime]> {
        match self {
            Self::DateTimeList(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date_list(&self) -> Option<&[Date]> {
        match self {
            Self::DateList(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_duration(&self) -> Option<&Duration> {
        match self {
            Self::Duration(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_utc_offset(&self) -> Option<i32> {
        match self {
            Self::UtcOffset(secs) => Some(*secs),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_recur(&self) -> Option<&str> {
        match self {
            Self::Recur(s) => Some(s),
            _ => None,
        }
    }
}
