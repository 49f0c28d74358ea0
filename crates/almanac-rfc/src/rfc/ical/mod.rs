//! iCalendar (RFC 5545) support: the object model, a lenient parser and a
//! canonical serializer.

pub mod build;
pub mod core;
pub mod parse;
