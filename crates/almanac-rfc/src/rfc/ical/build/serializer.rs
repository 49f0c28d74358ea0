//! iCalendar serializer.

use base64::{Engine, engine::general_purpose::STANDARD};

use super::escape::{escape_param_value, escape_text};
use super::fold::fold_line;
use crate::rfc::ical::core::{Component, ICalendar, Property, Value};

/// Serializes a calendar document.
#[must_use]
pub fn serialize(ical: &ICalendar) -> String {
    serialize_component(&ical.root)
}

/// Serializes a component and its children.
#[must_use]
pub fn serialize_component(component: &Component) -> String {
    let mut out = String::new();
    write_component(&mut out, component);
    out
}

fn write_component(out: &mut String, component: &Component) {
    push_line(out, &format!("BEGIN:{}", component.name));
    for prop in &component.properties {
        out.push_str(&serialize_property(prop));
    }
    for child in &component.children {
        write_component(out, child);
    }
    push_line(out, &format!("END:{}", component.name));
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(&fold_line(line));
    out.push_str("\r\n");
}

/// Serializes one property as a folded content line, including the CRLF.
#[must_use]
pub fn serialize_property(prop: &Property) -> String {
    let mut line = prop.name.clone();

    for param in &prop.params {
        let values: Vec<String> = param
            .values
            .iter()
            .map(|v| escape_param_value(v))
            .collect();
        line.push(';');
        line.push_str(&param.name);
        line.push('=');
        line.push_str(&values.join(","));
    }

    line.push(':');
    line.push_str(&format_value(&prop.value));

    let mut out = fold_line(&line);
    out.push_str("\r\n");
    out
}

fn format_value(value: &Value) -> String {
    fn join<T: ToString>(items: &[T]) -> String {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    match value {
        Value::Text(s) => escape_text(s),
        Value::TextList(items) => items
            .iter()
            .map(|item| escape_text(item))
            .collect::<Vec<_>>()
            .join(","),
        Value::DateTime(dt) => dt.to_string(),
        Value::Date(d) => d.to_string(),
        Value::DateTimeList(list) => join(list.as_slice()),
        Value::DateList(list) => join(list.as_slice()),
        Value::Duration(d) => d.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::UtcOffset(secs) => format_utc_offset(*secs),
        Value::Binary(data) => STANDARD.encode(data),
        Value::Recur(s) | Value::Unknown(s) => s.clone(),
    }
}

fn format_utc_offset(secs: i32) -> String {
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    let (hours, minutes, seconds) = (abs / 3600, abs % 3600 / 60, abs % 60);
    if seconds == 0 {
        format!("{sign}{hours:02}{minutes:02}")
    } else {
        format!("{sign}{hours:02}{minutes:02}{seconds:02}")
    }
}
