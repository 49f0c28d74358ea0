//! Stored component types.

use std::fmt;

use chrono::FixedOffset;

use almanac_rfc::rfc::ical::build::serialize_component;
use almanac_rfc::rfc::ical::core::{Component, ComponentKind, names};
use almanac_rfc::rfc::ical::parse::parse_component;

use crate::error::{StoreError, StoreResult};

/// Identity of a stored component: its UID plus, for a detached recurrence,
/// its RECURRENCE-ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    pub uid: String,
    pub rid: Option<String>,
}

impl ComponentId {
    /// Creates an id; an empty `rid` selects the master.
    #[must_use]
    pub fn new(uid: impl Into<String>, rid: Option<&str>) -> Self {
        Self {
            uid: uid.into(),
            rid: normalize_rid(rid).map(str::to_string),
        }
    }

    #[must_use]
    pub fn master(uid: impl Into<String>) -> Self {
        Self::new(uid, None)
    }

    #[must_use]
    pub fn rid(&self) -> Option<&str> {
        self.rid.as_deref()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rid {
            Some(rid) => write!(f, "{}#{rid}", self.uid),
            None => f.write_str(&self.uid),
        }
    }
}

/// Treats `Some("")` the same as `None`.
pub(crate) fn normalize_rid(rid: Option<&str>) -> Option<&str> {
    rid.filter(|r| !r.is_empty())
}

/// A calendar component held by a store.
///
/// Wraps the parsed iCalendar component and exposes the fields the store
/// keys on.
#[derive(Debug, Clone, PartialEq)]
pub struct CalComponent {
    component: Component,
}

impl CalComponent {
    #[must_use]
    pub const fn new(component: Component) -> Self {
        Self { component }
    }

    /// ## Summary
    /// Parses a stand-alone component such as `BEGIN:VEVENT ... END:VEVENT`.
    ///
    /// ## Errors
    /// Returns `StoreError::ParseError` if the text is not a well-formed
    /// component.
    pub fn from_ical_string(text: &str) -> StoreResult<Self> {
        Ok(Self::new(parse_component(text)?))
    }

    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.component.kind()
    }

    /// Returns the UID, treating an empty value as missing.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.component.uid().filter(|uid| !uid.is_empty())
    }

    #[must_use]
    pub fn recurrence_id(&self) -> Option<&str> {
        self.component.recurrence_id()
    }

    #[must_use]
    pub fn is_recurrence_instance(&self) -> bool {
        self.component.is_recurrence_instance()
    }

    /// Returns the store identity, or `None` if the component has no UID.
    #[must_use]
    pub fn id(&self) -> Option<ComponentId> {
        Some(ComponentId::new(self.uid()?, self.recurrence_id()))
    }

    #[must_use]
    pub const fn as_component(&self) -> &Component {
        &self.component
    }

    #[must_use]
    pub fn into_component(self) -> Component {
        self.component
    }

    #[must_use]
    pub fn to_ical_string(&self) -> String {
        serialize_component(&self.component)
    }
}

impl From<Component> for CalComponent {
    fn from(component: Component) -> Self {
        Self::new(component)
    }
}

/// A VTIMEZONE definition keyed by its TZID.
#[derive(Debug, Clone, PartialEq)]
pub struct Timezone {
    tzid: String,
    component: Component,
}

impl Timezone {
    /// Wraps a VTIMEZONE component; `None` if it is another kind or has no TZID.
    #[must_use]
    pub fn from_component(component: Component) -> Option<Self> {
        if component.kind() != ComponentKind::Timezone {
            return None;
        }
        let tzid = component.tzid().filter(|t| !t.is_empty())?.to_string();
        Some(Self { tzid, component })
    }

    /// ## Summary
    /// Parses a stand-alone VTIMEZONE.
    ///
    /// ## Errors
    /// Returns `StoreError::ParseError` for malformed text and
    /// `StoreError::InvalidComponent` if it is not a VTIMEZONE with a TZID.
    pub fn from_ical_string(text: &str) -> StoreResult<Self> {
        let component = parse_component(text)?;
        let name = component.name.clone();
        Self::from_component(component).ok_or_else(|| {
            StoreError::InvalidComponent(format!("{name} is not a VTIMEZONE with a TZID"))
        })
    }

    /// Builds a minimal VTIMEZONE with one fixed STANDARD offset.
    #[must_use]
    pub fn fixed(tzid: impl Into<String>, offset_seconds: i32) -> Self {
        use almanac_rfc::rfc::ical::core::{DateTime, Property, Value};

        let tzid = tzid.into();
        let offset = |name: &str| Property {
            name: name.to_string(),
            params: Vec::new(),
            value: Value::UtcOffset(offset_seconds),
            raw_value: String::new(),
        };

        let mut standard = Component::new(ComponentKind::Standard);
        standard.add_property(Property::datetime(
            names::DTSTART,
            DateTime::floating(1970, 1, 1, 0, 0, 0),
        ));
        standard.add_property(offset(names::TZOFFSETFROM));
        standard.add_property(offset(names::TZOFFSETTO));

        let mut component = Component::timezone();
        component.add_property(Property::text(names::TZID, tzid.clone()));
        component.add_child(standard);

        Self { tzid, component }
    }

    #[must_use]
    pub fn tzid(&self) -> &str {
        &self.tzid
    }

    #[must_use]
    pub const fn as_component(&self) -> &Component {
        &self.component
    }

    /// Returns the TZOFFSETTO of the first STANDARD (else DAYLIGHT) rule.
    #[must_use]
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        [ComponentKind::Standard, ComponentKind::Daylight]
            .into_iter()
            .flat_map(|kind| self.component.children_of_kind(kind))
            .find_map(|rule| rule.get_property(names::TZOFFSETTO)?.value.as_utc_offset())
            .and_then(FixedOffset::east_opt)
    }

    #[must_use]
    pub fn to_ical_string(&self) -> String {
        serialize_component(&self.component)
    }
}
