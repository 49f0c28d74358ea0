use std::collections::HashMap;
use std::sync::Arc;

use crate::component::{CalComponent, ComponentId, normalize_rid};

/// All stored instances sharing one UID: an optional master plus detached
/// recurrences keyed by RECURRENCE-ID.
#[derive(Debug, Clone, Default)]
pub struct ComponentGroup {
    master: Option<Arc<CalComponent>>,
    overrides: HashMap<String, Arc<CalComponent>>,
}

impl ComponentGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `component` as the master or as the override for its
    /// RECURRENCE-ID, replacing any previous one.
    pub fn put(&mut self, component: Arc<CalComponent>) {
        match component.recurrence_id() {
            Some(rid) => {
                let rid = rid.to_string();
                self.overrides.insert(rid, component);
            }
            None => self.master = Some(component),
        }
    }

    #[must_use]
    pub fn get(&self, rid: Option<&str>) -> Option<&Arc<CalComponent>> {
        match normalize_rid(rid) {
            Some(rid) => self.overrides.get(rid),
            None => self.master.as_ref(),
        }
    }

    #[must_use]
    pub fn has(&self, rid: Option<&str>) -> bool {
        self.get(rid).is_some()
    }

    /// Removes one override. Returns whether it existed.
    ///
    /// An empty `rid` is not handled here: removing the master removes the
    /// whole group, which is the owner's job.
    pub fn remove_override(&mut self, rid: &str) -> bool {
        self.overrides.remove(rid).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.master.is_none() && self.overrides.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.master.is_some()) + self.overrides.len()
    }

    /// Returns the master first, then overrides ordered by RECURRENCE-ID.
    #[must_use]
    pub fn components(&self) -> Vec<Arc<CalComponent>> {
        let mut rids: Vec<&String> = self.overrides.keys().collect();
        rids.sort_unstable();

        self.master
            .iter()
            .cloned()
            .chain(rids.into_iter().map(|rid| Arc::clone(&self.overrides[rid])))
            .collect()
    }

    #[must_use]
    pub fn ids(&self, uid: &str) -> Vec<ComponentId> {
        self.master
            .as_ref()
            .map(|_| ComponentId::master(uid))
            .into_iter()
            .chain(
                self.overrides
                    .keys()
                    .map(|rid| ComponentId::new(uid, Some(rid))),
            )
            .collect()
    }
}
