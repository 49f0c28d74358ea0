//! The component store contract and the interval-indexed layer every
//! backend is wrapped in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use almanac_core::constants::{DEFAULT_ZONE_KEY, PRODUCT_ID};
use almanac_rfc::rfc::ical::build::serialize;
use almanac_rfc::rfc::ical::core::ICalendar;

use crate::component::{CalComponent, ComponentId, Timezone, normalize_rid};
use crate::interval_tree::IntervalTree;
use crate::occurrence::{ZoneResolver, occurrence_range};

/// Storage operations shared by every backend.
///
/// Failures are reported through the return values: `false`, `None` or an
/// empty collection. An empty or missing `rid` selects the master
/// component of a UID.
pub trait ComponentStore: Send + Sync {
    /// Initializes the backend. Only the first call does any work; later
    /// calls return the first result.
    fn load(&self) -> bool;

    fn get_component(&self, uid: &str, rid: Option<&str>) -> Option<Arc<CalComponent>>;

    /// Stores `component` as the master or override of its UID.
    ///
    /// Returns `false` only if the component has no UID.
    fn put_component(&self, component: CalComponent) -> bool;

    /// Removes one override, or with an empty `rid` every instance of
    /// `uid`.
    fn remove_component(&self, uid: &str, rid: Option<&str>) -> bool;

    fn has_component(&self, uid: &str, rid: Option<&str>) -> bool;

    fn get_components_by_uid(&self, uid: &str) -> Vec<Arc<CalComponent>>;

    fn get_components(&self) -> Vec<Arc<CalComponent>>;

    fn get_component_ids(&self) -> Vec<ComponentId>;

    fn get_timezone(&self, tzid: &str) -> Option<Timezone>;

    /// Stores a copy of `timezone`, replacing any with the same TZID.
    fn put_timezone(&self, timezone: &Timezone) -> bool;

    fn remove_timezone(&self, tzid: &str) -> bool;

    fn get_timezones(&self) -> Vec<Timezone>;

    fn get_key_value(&self, key: &str) -> Option<String>;

    /// Sets a key, or removes it when `value` is `None`.
    fn put_key_value(&self, key: &str, value: Option<&str>) -> bool;

    /// Suspends persistence until the matching [`thaw_changes`].
    ///
    /// [`thaw_changes`]: ComponentStore::thaw_changes
    fn freeze_changes(&self);

    /// Ends one freeze; the outermost thaw persists pending changes.
    fn thaw_changes(&self);

    /// Deletes all backing storage and clears the store.
    fn remove(&self) -> bool;

    /// Empties the store and persists the empty state.
    fn clean(&self) -> bool;

    fn get_default_timezone(&self) -> Option<Timezone> {
        let tzid = self.get_key_value(DEFAULT_ZONE_KEY)?;
        self.get_timezone(&tzid)
    }

    /// Stores `timezone` and records its TZID as the default.
    fn set_default_timezone(&self, timezone: &Timezone) -> bool {
        self.put_timezone(timezone) && self.put_key_value(DEFAULT_ZONE_KEY, Some(timezone.tzid()))
    }

    /// Serializes every instance of `uid`.
    ///
    /// A lone component is written on its own; a master with detached
    /// recurrences is wrapped in a VCALENDAR.
    fn get_components_by_uid_as_ical_string(&self, uid: &str) -> Option<String> {
        match self.get_components_by_uid(uid).as_slice() {
            [] => None,
            [single] => Some(single.to_ical_string()),
            many => {
                let mut calendar = ICalendar::new(PRODUCT_ID);
                for component in many {
                    calendar.add_component(component.as_component().clone());
                }
                Some(serialize(&calendar))
            }
        }
    }
}

type Index = IntervalTree<DateTime<Utc>, ComponentId>;

/// Wraps a backend with an interval index for time-range queries.
///
/// Only [`put_component_with_time_range`] adds index entries, besides the
/// initial [`load`]; a plain `put_component` leaves the index untouched.
/// Both removal paths drop the matching entries.
///
/// [`put_component_with_time_range`]: CalendarStore::put_component_with_time_range
/// [`load`]: ComponentStore::load
#[derive(Debug)]
pub struct CalendarStore<S> {
    backend: S,
    index: RwLock<Index>,
    loaded: Mutex<Option<bool>>,
}

impl<S: ComponentStore> CalendarStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            index: RwLock::new(IntervalTree::new()),
            loaded: Mutex::new(None),
        }
    }

    pub const fn backend(&self) -> &S {
        &self.backend
    }

    /// Stores `component` and indexes it over `[start, end)`.
    pub fn put_component_with_time_range(
        &self,
        component: CalComponent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> bool {
        let Some(id) = component.id() else {
            tracing::warn!("Rejecting component without UID");
            return false;
        };

        let mut index = self.index.write();
        if !self.backend.put_component(component) {
            return false;
        }
        index.insert(start, end, id);
        true
    }

    /// Returns the events, to-dos and journals whose indexed range overlaps
    /// `[start, end]`.
    pub fn get_components_occurring_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Arc<CalComponent>> {
        let index = self.index.read();
        index
            .search(start, end)
            .into_iter()
            .filter_map(|id| self.backend.get_component(&id.uid, id.rid()))
            .filter(|component| component.kind().is_schedulable())
            .collect()
    }

    /// Number of indexed components.
    pub fn indexed_len(&self) -> usize {
        self.index.read().len()
    }

    /// Freezes changes until the returned guard is dropped.
    pub fn freeze(&self) -> FreezeGuard<'_> {
        FreezeGuard::new(&self.backend)
    }

    /// Indexes every stored component by its occurrence range.
    fn index_all(&self, index: &mut Index) {
        let timezones = self.backend.get_timezones();
        let mut resolver = ZoneResolver::with_timezones(&timezones);
        resolver.set_default(self.backend.get_key_value(DEFAULT_ZONE_KEY).as_deref());

        for component in self.backend.get_components() {
            let Some(id) = component.id() else {
                continue;
            };
            if let Some((start, end)) = occurrence_range(component.as_component(), &resolver) {
                tracing::trace!(%id, %start, %end, "Indexing component");
                index.insert(start, end, id);
            }
        }
        tracing::debug!(count = index.len(), "Built occurrence index");
    }
}

impl<S: ComponentStore> ComponentStore for CalendarStore<S> {
    fn load(&self) -> bool {
        let mut loaded = self.loaded.lock();
        if let Some(ok) = *loaded {
            return ok;
        }

        let mut index = self.index.write();
        let ok = self.backend.load();
        if ok {
            index.clear();
            self.index_all(&mut index);
        }
        *loaded = Some(ok);
        ok
    }

    fn get_component(&self, uid: &str, rid: Option<&str>) -> Option<Arc<CalComponent>> {
        self.backend.get_component(uid, rid)
    }

    fn put_component(&self, component: CalComponent) -> bool {
        self.backend.put_component(component)
    }

    fn remove_component(&self, uid: &str, rid: Option<&str>) -> bool {
        let mut index = self.index.write();
        match normalize_rid(rid) {
            Some(_) => {
                index.remove(&ComponentId::new(uid, rid));
            }
            None => {
                index.remove(&ComponentId::master(uid));
                for id in self.backend.get_component_ids() {
                    if id.uid == uid {
                        index.remove(&id);
                    }
                }
            }
        }
        self.backend.remove_component(uid, rid)
    }

    fn has_component(&self, uid: &str, rid: Option<&str>) -> bool {
        self.backend.has_component(uid, rid)
    }

    fn get_components_by_uid(&self, uid: &str) -> Vec<Arc<CalComponent>> {
        self.backend.get_components_by_uid(uid)
    }

    fn get_components(&self) -> Vec<Arc<CalComponent>> {
        self.backend.get_components()
    }

    fn get_component_ids(&self) -> Vec<ComponentId> {
        self.backend.get_component_ids()
    }

    fn get_timezone(&self, tzid: &str) -> Option<Timezone> {
        self.backend.get_timezone(tzid)
    }

    fn put_timezone(&self, timezone: &Timezone) -> bool {
        self.backend.put_timezone(timezone)
    }

    fn remove_timezone(&self, tzid: &str) -> bool {
        self.backend.remove_timezone(tzid)
    }

    fn get_timezones(&self) -> Vec<Timezone> {
        self.backend.get_timezones()
    }

    fn get_key_value(&self, key: &str) -> Option<String> {
        self.backend.get_key_value(key)
    }

    fn put_key_value(&self, key: &str, value: Option<&str>) -> bool {
        self.backend.put_key_value(key, value)
    }

    fn freeze_changes(&self) {
        self.backend.freeze_changes();
    }

    fn thaw_changes(&self) {
        self.backend.thaw_changes();
    }

    fn remove(&self) -> bool {
        let mut index = self.index.write();
        index.clear();
        self.backend.remove()
    }

    fn clean(&self) -> bool {
        let mut index = self.index.write();
        index.clear();
        self.backend.clean()
    }
}

/// Thaws the store it was created from when dropped.
#[must_use = "changes are thawed as soon as the guard is dropped"]
pub struct FreezeGuard<'a> {
    store: &'a dyn ComponentStore,
}

impl<'a> FreezeGuard<'a> {
    pub fn new(store: &'a dyn ComponentStore) -> Self {
        store.freeze_changes();
        Self { store }
    }
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        self.store.thaw_changes();
    }
}

impl std::fmt::Debug for FreezeGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreezeGuard").finish_non_exhaustive()
    }
}
