//! iCalendar document parser (RFC 5545).
//!
//! Parses complete iCalendar documents into typed structures.

use std::iter::Peekable;

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::{parse_content_line, split_lines};
use super::values::{
    parse_date, parse_datetime, parse_duration, parse_integer, parse_utc_offset, split_text_list,
    unescape_text,
};
use crate::rfc::ical::core::{Component, ComponentKind, ContentLine, ICalendar, Property, Value};

/// Parses an iCalendar document from a string.
///
/// The document must be a single VCALENDAR. Content after its END line is
/// ignored.
///
/// ## Errors
///
/// Returns an error if the input is not valid iCalendar.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse(input: &str) -> ParseResult<ICalendar> {
    tracing::debug!("Parsing iCalendar document");

    let root = parse_component(input)?;

    if root.kind != Some(ComponentKind::Calendar) {
        tracing::warn!(name = %root.name, "Root component is not VCALENDAR");
        return Err(
            ParseError::new(ParseErrorKind::MissingBegin, 1, 1).with_context("expected VCALENDAR")
        );
    }

    tracing::debug!(
        components = root.children.len(),
        "iCalendar document parsed successfully"
    );

    Ok(ICalendar { root })
}

/// Parses the first component in `input`, of any kind.
///
/// Used for stand-alone component text such as a single `VEVENT`.
///
/// ## Errors
///
/// Returns an error if the input does not hold a well-formed component.
pub fn parse_component(input: &str) -> ParseResult<Component> {
    let lines = split_lines(input);

    if lines.is_empty() {
        tracing::warn!("Empty iCalendar input");
        return Err(ParseError::new(ParseErrorKind::MissingBegin, 1, 1));
    }

    tracing::trace!(count = lines.len(), "Split lines");

    let content_lines: Vec<(usize, ContentLine)> = lines
        .into_iter()
        .map(|(line_num, line)| parse_content_line(&line, line_num).map(|cl| (line_num, cl)))
        .collect::<ParseResult<_>>()?;

    let mut iter = content_lines.into_iter().peekable();

    let (line_num, begin) = iter
        .next()
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingBegin, 1, 1))?;
    if begin.name != "BEGIN" || begin.raw_value.is_empty() {
        return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1));
    }

    let component = parse_component_body(&mut iter, line_num, &begin.raw_value)?;

    if let Some((trailing, _)) = iter.peek() {
        tracing::debug!(line = trailing, "Ignoring content after the root component");
    }

    Ok(component)
}

/// Parses properties and children up to the END matching `name`.
fn parse_component_body(
    iter: &mut Peekable<impl Iterator<Item = (usize, ContentLine)>>,
    begin_line_num: usize,
    name: &str,
) -> ParseResult<Component> {
    let mut component = Component::custom(name);
    let mut last_line_num = begin_line_num;

    loop {
        let Some((line_num, content_line)) = iter.next() else {
            return Err(
                ParseError::new(ParseErrorKind::MissingEnd, last_line_num, 1)
                    .with_context(format!("missing END:{}", component.name)),
            );
        };
        last_line_num = line_num;

        match content_line.name.as_str() {
            "BEGIN" => {
                let nested = parse_component_body(iter, line_num, &content_line.raw_value)?;
                component.children.push(nested);
            }
            "END" => {
                let end_name = content_line.raw_value.to_ascii_uppercase();
                if end_name != component.name {
                    return Err(
                        ParseError::new(ParseErrorKind::MismatchedComponent, line_num, 1)
                            .with_context(format!(
                                "expected END:{}, got END:{end_name}",
                                component.name
                            )),
                    );
                }
                return Ok(component);
            }
            _ => {
                let property = parse_property(content_line, line_num)?;
                component.properties.push(property);
            }
        }
    }
}

/// Parses a property from a content line, resolving the value type.
fn parse_property(cl: ContentLine, line_num: usize) -> ParseResult<Property> {
    let value_type = determine_value_type(&cl);
    let value = parse_value(&cl.raw_value, value_type, cl.tzid(), line_num).map_err(|e| {
        let context = format!("property {}", cl.name);
        e.with_context(context)
    })?;

    Ok(Property {
        name: cl.name,
        params: cl.params,
        value,
        raw_value: cl.raw_value,
    })
}

/// Returns whether a date-or-date-time value is written as a bare DATE.
fn looks_like_date(raw: &str) -> bool {
    raw.split(',').all(|part| part.len() == 8 && !part.contains(['T', 't']))
}

/// Determines the value type for a property.
fn determine_value_type(cl: &ContentLine) -> ValueType {
    if matches!(cl.name.as_str(), "CATEGORIES" | "RESOURCES")
        && cl
            .value_type()
            .is_none_or(|value_type| value_type.eq_ignore_ascii_case("TEXT"))
    {
        return ValueType::TextList;
    }

    if let Some(value_type) = cl.value_type() {
        return ValueType::from_param(value_type);
    }

    match cl.name.as_str() {
        "DTSTART" | "DTEND" | "DUE" | "RECURRENCE-ID" | "EXDATE" | "RDATE" => {
            if looks_like_date(&cl.raw_value) {
                ValueType::Date
            } else if cl.raw_value.contains('/') {
                // PERIOD values are kept verbatim.
                ValueType::Unknown
            } else {
                ValueType::DateTime
            }
        }
        "DTSTAMP" | "CREATED" | "LAST-MODIFIED" | "COMPLETED" => ValueType::DateTime,

        "DURATION" => ValueType::Duration,
        "TRIGGER" => {
            if cl.raw_value.starts_with(['P', '+', '-']) {
                ValueType::Duration
            } else {
                ValueType::DateTime
            }
        }

        "PERCENT-COMPLETE" | "PRIORITY" | "REPEAT" | "SEQUENCE" => ValueType::Integer,

        "RRULE" | "EXRULE" => ValueType::Recur,

        "TZOFFSETFROM" | "TZOFFSETTO" => ValueType::UtcOffset,

        "CALSCALE" | "METHOD" | "PRODID" | "VERSION" | "CLASS" | "COMMENT" | "DESCRIPTION"
        | "LOCATION" | "STATUS" | "SUMMARY" | "TRANSP" | "TZID" | "TZNAME" | "UID" | "CONTACT"
        | "RELATED-TO" | "ACTION" | "NAME" | "COLOR" => ValueType::Text,

        // REQUEST-STATUS is structured with unescaped semicolons. It stays
        // verbatim along with URIs, CAL-ADDRESSes, GEO and X- properties.
        _ => ValueType::Unknown,
    }
}

/// Internal enum for value type handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Binary,
    Date,
    DateTime,
    Duration,
    Integer,
    Recur,
    Text,
    TextList,
    UtcOffset,
    Unknown,
}

impl ValueType {
    fn from_param(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "BINARY" => Self::Binary,
            "DATE" => Self::Date,
            "DATE-TIME" => Self::DateTime,
            "DURATION" => Self::Duration,
            "INTEGER" => Self::Integer,
            "RECUR" => Self::Recur,
            "TEXT" => Self::Text,
            "UTC-OFFSET" => Self::UtcOffset,
            _ => Self::Unknown,
        }
    }
}

/// Parses a raw value string into a typed Value.
fn parse_value(
    raw: &str,
    value_type: ValueType,
    tzid: Option<&str>,
    line_num: usize,
) -> ParseResult<Value> {
    match value_type {
        ValueType::Text => Ok(Value::Text(unescape_text(raw))),
        ValueType::TextList => Ok(Value::TextList(split_text_list(raw))),
        ValueType::DateTime => {
            if raw.contains(',') {
                let dts = raw
                    .split(',')
                    .map(|s| parse_datetime(s.trim(), tzid, line_num, 1))
                    .collect::<ParseResult<_>>()?;
                Ok(Value::DateTimeList(dts))
            } else {
                Ok(Value::DateTime(parse_datetime(raw, tzid, line_num, 1)?))
            }
        }
        ValueType::Date => {
            if raw.contains(',') {
                let dates = raw
                    .split(',')
                    .map(|s| parse_date(s.trim(), line_num, 1))
                    .collect::<ParseResult<_>>()?;
                Ok(Value::DateList(dates))
            } else {
                Ok(Value::Date(parse_date(raw, line_num, 1)?))
            }
        }
        ValueType::Duration => Ok(Value::Duration(parse_duration(raw, line_num, 1)?)),
        ValueType::Integer => Ok(Value::Integer(parse_integer(raw, line_num, 1)?)),
        ValueType::UtcOffset => Ok(Value::UtcOffset(parse_utc_offset(raw, line_num, 1)?)),
        ValueType::Recur => Ok(Value::Recur(raw.to_string())),
        ValueType::Binary => {
            use base64::{Engine, engine::general_purpose::STANDARD};
            let decoded = STANDARD.decode(raw).map_err(|e| {
                ParseError::new(ParseErrorKind::InvalidValue, line_num, 1)
                    .with_context(format!("invalid Base64 encoding: {e}"))
            })?;
            Ok(Value::Binary(decoded))
        }
        ValueType::Unknown => Ok(Value::Unknown(raw.to_string())),
    }
}
