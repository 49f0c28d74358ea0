//! iCalendar serialization (RFC 5545).
//!
//! Output is canonical: CRLF line endings, escaped TEXT, quoted parameter
//! values where needed and lines folded at 75 octets.

mod escape;
mod fold;
mod serializer;

pub use escape::{escape_param_value, escape_text};
pub use fold::fold_line;
pub use serializer::{serialize, serialize_component, serialize_property};
