//! Occurrence range derivation.
//!
//! Computes the absolute `[start, end)` span a component occupies on the
//! timeline, covering every instance of a recurring series. Used to index
//! components when a store is loaded from disk.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use rrule::{RRule, Tz as RRuleTz, Unvalidated};

use almanac_rfc::rfc::ical::core::{
    Component, ComponentKind, Date, DateTime as IcalDateTime, DateTimeForm, Property, Value,
    names,
};

use crate::component::Timezone;

/// A resolved timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Utc,
    Named(chrono_tz::Tz),
    Fixed(FixedOffset),
}

impl Zone {
    /// Converts a wall-clock time in this zone to UTC.
    ///
    /// Ambiguous times take the earlier instant. Times inside a DST gap are
    /// shifted forward by an hour; if that still fails the wall-clock value
    /// is read as UTC.
    #[must_use]
    pub fn to_utc(self, naive: NaiveDateTime) -> DateTime<Utc> {
        fn local<T: TimeZone>(tz: &T, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }

        let resolved = match self {
            Self::Utc => None,
            Self::Named(tz) => local(&tz, naive).or_else(|| {
                naive
                    .checked_add_signed(TimeDelta::hours(1))
                    .and_then(|shifted| local(&tz, shifted))
            }),
            Self::Fixed(offset) => local(&offset, naive),
        };
        resolved.unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }

    /// The zone a series is expanded in. Fixed offsets never shift, so
    /// expanding them in UTC yields the same instants.
    fn expansion_tz(self) -> RRuleTz {
        match self {
            Self::Named(tz) => RRuleTz::Tz(tz),
            Self::Utc | Self::Fixed(_) => RRuleTz::UTC,
        }
    }
}

/// Maps TZID strings to zones.
///
/// IANA names resolve through chrono-tz; anything else falls back to the
/// fixed offset of a stored VTIMEZONE with that TZID, then to UTC.
#[derive(Debug, Clone, Default)]
pub struct ZoneResolver {
    default: Option<Zone>,
    custom: HashMap<String, FixedOffset>,
}

impl ZoneResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timezones<'a>(timezones: impl IntoIterator<Item = &'a Timezone>) -> Self {
        let custom = timezones
            .into_iter()
            .filter_map(|tz| Some((tz.tzid().to_string(), tz.utc_offset()?)))
            .collect();
        Self {
            default: None,
            custom,
        }
    }

    /// Sets the zone used for floating times and all-day dates.
    pub fn set_default(&mut self, tzid: Option<&str>) {
        self.default = tzid.map(|tzid| self.resolve(tzid));
    }

    #[must_use]
    pub fn resolve(&self, tzid: &str) -> Zone {
        if let Ok(tz) = tzid.parse::<chrono_tz::Tz>() {
            return Zone::Named(tz);
        }
        self.custom
            .get(tzid)
            .map_or(Zone::Utc, |offset| Zone::Fixed(*offset))
    }

    fn floating(&self) -> Zone {
        self.default.unwrap_or(Zone::Utc)
    }

    #[must_use]
    pub fn datetime_to_utc(&self, dt: &IcalDateTime) -> Option<DateTime<Utc>> {
        let naive = dt.to_naive()?;
        Some(self.datetime_zone(dt).to_utc(naive))
    }

    fn datetime_zone(&self, dt: &IcalDateTime) -> Zone {
        match &dt.form {
            DateTimeForm::Utc => Zone::Utc,
            DateTimeForm::Floating => self.floating(),
            DateTimeForm::Zoned { tzid } => self.resolve(tzid),
        }
    }

    /// Returns local midnight of `date` in `tzid`, or in the default zone.
    #[must_use]
    pub fn date_to_utc(&self, date: Date, tzid: Option<&str>) -> Option<DateTime<Utc>> {
        let zone = tzid.map_or_else(|| self.floating(), |tzid| self.resolve(tzid));
        Some(zone.to_utc(date.to_naive()?.and_time(NaiveTime::MIN)))
    }

    /// Returns the zone a DATE or DATE-TIME property's wall-clock value is
    /// read in.
    fn zone_of(&self, prop: &Property) -> Zone {
        match &prop.value {
            Value::DateTime(dt) => self.datetime_zone(dt),
            _ => prop
                .tzid()
                .map_or_else(|| self.floating(), |tzid| self.resolve(tzid)),
        }
    }

    /// Returns the instant of a DATE or DATE-TIME property, and whether it
    /// was an all-day DATE.
    fn instant(&self, prop: &Property) -> Option<(DateTime<Utc>, bool)> {
        match &prop.value {
            Value::DateTime(dt) => Some((self.datetime_to_utc(dt)?, false)),
            Value::Date(date) => Some((self.date_to_utc(*date, prop.tzid())?, true)),
            _ => None,
        }
    }

    /// Returns every instant listed by the named properties.
    fn instants(&self, component: &Component, name: &str) -> Vec<DateTime<Utc>> {
        let mut out = Vec::new();
        for prop in component.get_properties(name) {
            match &prop.value {
                Value::DateTime(dt) => out.extend(self.datetime_to_utc(dt)),
                Value::Date(date) => out.extend(self.date_to_utc(*date, prop.tzid())),
                Value::DateTimeList(list) => {
                    out.extend(list.iter().filter_map(|dt| self.datetime_to_utc(dt)));
                }
                Value::DateList(list) => {
                    out.extend(
                        list.iter()
                            .filter_map(|date| self.date_to_utc(*date, prop.tzid())),
                    );
                }
                _ => {}
            }
        }
        out
    }
}

/// Returns the span covered by every occurrence of `component`.
///
/// `None` for kinds that never occur on the timeline (timezones, alarms).
/// A component without a start covers the whole timeline; an open-ended
/// series or a to-do without a due date runs to the end of time.
#[must_use]
pub fn occurrence_range(
    component: &Component,
    resolver: &ZoneResolver,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let kind = component.kind();
    if !kind.is_schedulable() {
        return None;
    }
    let is_todo = kind == ComponentKind::Todo;
    let point = |name: &str| {
        component
            .get_property(name)
            .and_then(|prop| resolver.instant(prop))
    };

    let start = point(names::DTSTART).or_else(|| is_todo.then(|| point(names::DUE)).flatten());
    let Some((start, all_day)) = start else {
        return Some((DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC));
    };

    let end = if let Some((end, _)) = point(names::DTEND) {
        end
    } else if let Some(duration) = component
        .get_property(names::DURATION)
        .and_then(Property::as_duration)
    {
        saturating_add(start, duration.to_time_delta())
    } else if is_todo {
        point(names::DUE).map_or(DateTime::<Utc>::MAX_UTC, |(due, _)| due)
    } else if all_day {
        saturating_add(start, TimeDelta::days(1))
    } else {
        start
    };
    let end = end.max(start);
    let duration = end - start;

    let rdates = resolver.instants(component, names::RDATE);

    if let Some(rule) = component
        .get_property(names::RRULE)
        .and_then(|prop| prop.value.as_recur())
    {
        let exdates = resolver.instants(component, names::EXDATE);
        let zone = component
            .get_property(names::DTSTART)
            .or_else(|| component.get_property(names::DUE))
            .map_or(Zone::Utc, |prop| resolver.zone_of(prop));
        let last = last_instance(rule, start, zone, &rdates, &exdates);
        let end = last.map_or(DateTime::<Utc>::MAX_UTC, |last| {
            saturating_add(last, duration).max(end)
        });
        return Some((start, end));
    }

    let end = rdates
        .into_iter()
        .map(|rdate| saturating_add(rdate, duration))
        .max()
        .map_or(end, |last| last.max(end));
    Some((start, end))
}

/// Returns the start of the last instance of a bounded series, or `None` if
/// the series is unbounded or cannot be expanded.
///
/// The series is expanded in `zone` so instances keep their wall-clock time
/// across DST changes.
fn last_instance(
    rule: &str,
    start: DateTime<Utc>,
    zone: Zone,
    rdates: &[DateTime<Utc>],
    exdates: &[DateTime<Utc>],
) -> Option<DateTime<Utc>> {
    let upper = rule.to_ascii_uppercase();
    if !upper.contains("COUNT=") && !upper.contains("UNTIL=") {
        return None;
    }

    let rrule = match rule.parse::<RRule<Unvalidated>>() {
        Ok(rrule) => rrule,
        Err(err) => {
            tracing::trace!(%rule, %err, "Unparseable RRULE, treating series as unbounded");
            return None;
        }
    };
    let tz = zone.expansion_tz();
    let mut rrule_set = match rrule.build(start.with_timezone(&tz)) {
        Ok(set) => set,
        Err(err) => {
            tracing::trace!(%rule, %err, "Invalid RRULE, treating series as unbounded");
            return None;
        }
    };

    let to_rrule_tz = |dates: &[DateTime<Utc>]| -> Vec<DateTime<RRuleTz>> {
        dates
            .iter()
            .map(|dt| dt.with_timezone(&tz))
            .collect()
    };
    if !rdates.is_empty() {
        rrule_set = rrule_set.set_rdates(to_rrule_tz(rdates));
    }
    if !exdates.is_empty() {
        rrule_set = rrule_set.set_exdates(to_rrule_tz(exdates));
    }

    let result = rrule_set.all(u16::MAX);
    if result.limited {
        tracing::trace!(%rule, "Expansion limit reached, treating series as unbounded");
        return None;
    }
    Some(
        result
            .dates
            .iter()
            .map(|dt| dt.with_timezone(&Utc))
            .max()
            .unwrap_or(start),
    )
}

fn saturating_add(instant: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    instant.checked_add_signed(delta).unwrap_or(if delta < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
