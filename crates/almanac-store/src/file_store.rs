//! A store kept in one iCalendar file plus a key-value file, written back
//! after a quiet period.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;

use almanac_core::config::StoreSettings;
use almanac_core::constants::{
    CALENDAR_FILE_NAME, DEFAULT_SAVE_DELAY_MS, KEY_FILE_NAME, PRODUCT_ID,
};
use almanac_rfc::rfc::ical::build::serialize;
use almanac_rfc::rfc::ical::core::{ComponentKind, ICalendar};
use almanac_rfc::rfc::ical::parse::parse;

use crate::component::{CalComponent, ComponentId, Timezone, normalize_rid};
use crate::error::StoreResult;
use crate::group::ComponentGroup;
use crate::key_file::KeyFile;
use crate::persist::{remove_if_exists, temp_path, write_atomically};
use crate::scheduler::SaveScheduler;
use crate::store::ComponentStore;

/// What a source holds; selects its cache sub-directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Events,
    Tasks,
    Memos,
}

impl SourceKind {
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Events => "calendar",
            Self::Tasks => "tasks",
            Self::Memos => "memos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStoreOptions {
    /// Quiet period after the last mutation before the file is rewritten.
    pub save_delay: Duration,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            save_delay: Duration::from_millis(DEFAULT_SAVE_DELAY_MS),
        }
    }
}

impl From<&StoreSettings> for FileStoreOptions {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            save_delay: settings.save_delay(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    groups: HashMap<String, ComponentGroup>,
    timezones: HashMap<String, Timezone>,
}

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    calendar_path: PathBuf,
    state: RwLock<State>,
    keys: KeyFile,
    loaded: Mutex<Option<bool>>,
    dirty: AtomicBool,
    frozen: AtomicUsize,
    saves: AtomicU64,
    /// Serializes writers of the calendar file.
    save_lock: Mutex<()>,
    scheduler: SaveScheduler,
}

/// File-backed component store.
///
/// The directory holds `calendar.ics` with every timezone and component,
/// and `keys.json` with the key-value entries. Mutations are written back
/// once the store has been quiet for [`FileStoreOptions::save_delay`];
/// `clean`, the outermost thaw and drop write immediately.
#[derive(Debug)]
pub struct FileStore {
    inner: Arc<Inner>,
}

impl FileStore {
    /// Creates a store over `dir`, scheduling saves on the ambient tokio
    /// runtime. Nothing is read until [`ComponentStore::load`].
    ///
    /// ## Errors
    /// Returns `StoreError::NoRuntime` outside a tokio runtime.
    pub fn new(dir: impl Into<PathBuf>, options: FileStoreOptions) -> StoreResult<Self> {
        let handle = Handle::try_current()?;
        Ok(Self::with_handle(dir, options, handle))
    }

    /// Creates a store whose debounced saves run on `handle`.
    #[must_use]
    pub fn with_handle(dir: impl Into<PathBuf>, options: FileStoreOptions, handle: Handle) -> Self {
        let dir = dir.into();
        let inner = Inner {
            calendar_path: dir.join(CALENDAR_FILE_NAME),
            keys: KeyFile::new(dir.join(KEY_FILE_NAME)),
            dir,
            state: RwLock::new(State::default()),
            loaded: Mutex::new(None),
            dirty: AtomicBool::new(false),
            frozen: AtomicUsize::new(0),
            saves: AtomicU64::new(0),
            save_lock: Mutex::new(()),
            scheduler: SaveScheduler::with_handle(handle, options.save_delay),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates the store for one source under `<cache_root>/<kind>/<source_uid>`.
    ///
    /// ## Errors
    /// Returns `StoreError::NoRuntime` outside a tokio runtime.
    pub fn for_source(
        cache_root: &Path,
        kind: SourceKind,
        source_uid: &str,
        options: FileStoreOptions,
    ) -> StoreResult<Self> {
        Self::new(cache_root.join(kind.dir_name()).join(source_uid), options)
    }

    /// ## Summary
    /// Creates the store for one source from loaded settings.
    ///
    /// ## Errors
    /// Returns `StoreError::CoreError` for invalid settings and
    /// `StoreError::NoRuntime` outside a tokio runtime.
    pub fn from_settings(
        settings: &StoreSettings,
        kind: SourceKind,
        source_uid: &str,
    ) -> StoreResult<Self> {
        settings.validate()?;
        Self::for_source(&settings.cache_root(), kind, source_uid, settings.into())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    #[must_use]
    pub fn calendar_path(&self) -> &Path {
        &self.inner.calendar_path
    }

    /// Whether a debounced save is waiting to run.
    #[must_use]
    pub fn pending_save(&self) -> bool {
        self.inner.scheduler.is_pending()
    }

    /// Number of completed writes of the calendar file.
    #[must_use]
    pub fn saves(&self) -> u64 {
        self.inner.saves.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Cancels any pending debounced save and writes the calendar file now.
    ///
    /// ## Errors
    /// Returns `StoreError::IoError` if the file cannot be written; the
    /// store stays dirty.
    pub fn flush(&self) -> StoreResult<()> {
        self.inner.scheduler.cancel();
        self.inner.save()
    }

    fn flush_logged(&self) -> bool {
        match self.flush() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %self.inner.calendar_path.display(), %err, "Failed to save calendar");
                false
            }
        }
    }

    /// Marks the store dirty and, unless frozen, restarts the save timer.
    fn changed(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        if self.inner.frozen.load(Ordering::SeqCst) > 0 {
            return;
        }
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.arm(move || {
            if let Some(inner) = weak.upgrade()
                && let Err(err) = inner.save_if_dirty()
            {
                tracing::warn!(path = %inner.calendar_path.display(), %err, "Debounced save failed");
            }
        });
    }
}

impl Inner {
    /// Reads both files. A missing or corrupt calendar file yields an empty
    /// store.
    fn load_files(&self) -> bool {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), %err, "Failed to create store directory");
            return false;
        }
        if !self.keys.load() {
            return false;
        }

        let text = match fs::read_to_string(&self.calendar_path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("No calendar file yet, starting empty");
                return true;
            }
            Err(err) => {
                tracing::warn!(%err, "Calendar file unreadable, starting empty");
                return true;
            }
        };
        let calendar = match parse(&text) {
            Ok(calendar) => calendar,
            Err(err) => {
                tracing::warn!(%err, "Calendar file is corrupt, starting empty");
                return true;
            }
        };

        let mut state = self.state.write();
        for component in calendar.into_components() {
            match component.kind() {
                ComponentKind::Timezone => {
                    if let Some(timezone) = Timezone::from_component(component) {
                        state.timezones.insert(timezone.tzid().to_string(), timezone);
                    }
                }
                kind if kind.is_schedulable() => {
                    let component = CalComponent::new(component);
                    let Some(uid) = component.uid().map(str::to_string) else {
                        tracing::trace!(%kind, "Skipping component without UID");
                        continue;
                    };
                    state
                        .groups
                        .entry(uid)
                        .or_default()
                        .put(Arc::new(component));
                }
                kind => tracing::trace!(%kind, "Skipping unsupported component"),
            }
        }
        tracing::debug!(
            groups = state.groups.len(),
            timezones = state.timezones.len(),
            "Loaded calendar file"
        );
        true
    }

    /// Timezones first, then components grouped by UID with the master
    /// ahead of its overrides.
    fn snapshot(&self) -> ICalendar {
        let state = self.state.read();
        let mut calendar = ICalendar::new(PRODUCT_ID);

        let mut tzids: Vec<&String> = state.timezones.keys().collect();
        tzids.sort_unstable();
        for tzid in tzids {
            calendar.add_component(state.timezones[tzid].as_component().clone());
        }

        let mut uids: Vec<&String> = state.groups.keys().collect();
        uids.sort_unstable();
        for uid in uids {
            for component in state.groups[uid].components() {
                calendar.add_component(component.as_component().clone());
            }
        }
        calendar
    }

    fn save(&self) -> StoreResult<()> {
        let _writer = self.save_lock.lock();
        self.write_calendar()
    }

    /// Runs a debounced save. A flush, clean or remove that got the lock
    /// first leaves nothing to write.
    fn save_if_dirty(&self) -> StoreResult<()> {
        let _writer = self.save_lock.lock();
        if !self.dirty.load(Ordering::SeqCst) {
            tracing::trace!("Nothing left to save");
            return Ok(());
        }
        self.write_calendar()
    }

    /// Caller holds `save_lock`.
    #[tracing::instrument(skip(self), fields(path = %self.calendar_path.display()))]
    fn write_calendar(&self) -> StoreResult<()> {
        // Cleared before the snapshot so a concurrent mutation re-marks it.
        self.dirty.store(false, Ordering::SeqCst);

        let text = serialize(&self.snapshot());
        if let Err(err) = write_atomically(&self.calendar_path, text.as_bytes()) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(err);
        }
        let saves = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(bytes = text.len(), saves, "Saved calendar");
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.scheduler.cancel();
        if self.dirty.load(Ordering::SeqCst) {
            match self.save() {
                Ok(()) => tracing::debug!("Flushed pending changes on drop"),
                Err(err) => tracing::warn!(%err, "Failed to flush pending changes on drop"),
            }
        }
    }
}

impl ComponentStore for FileStore {
    #[tracing::instrument(skip(self), fields(dir = %self.inner.dir.display()))]
    fn load(&self) -> bool {
        let mut loaded = self.inner.loaded.lock();
        if let Some(ok) = *loaded {
            return ok;
        }
        let ok = self.inner.load_files();
        *loaded = Some(ok);
        ok
    }

    fn get_component(&self, uid: &str, rid: Option<&str>) -> Option<Arc<CalComponent>> {
        self.inner.state.read().groups.get(uid)?.get(rid).cloned()
    }

    fn put_component(&self, component: CalComponent) -> bool {
        let Some(uid) = component.uid().map(str::to_string) else {
            tracing::warn!(kind = %component.kind(), "Rejecting component without UID");
            return false;
        };
        tracing::trace!(%uid, rid = ?component.recurrence_id(), "Putting component");
        self.inner
            .state
            .write()
            .groups
            .entry(uid)
            .or_default()
            .put(Arc::new(component));
        self.changed();
        true
    }

    fn remove_component(&self, uid: &str, rid: Option<&str>) -> bool {
        let removed = {
            let mut state = self.inner.state.write();
            match normalize_rid(rid) {
                None => state.groups.remove(uid).is_some(),
                Some(rid) => match state.groups.get_mut(uid) {
                    Some(group) => {
                        let removed = group.remove_override(rid);
                        if group.is_empty() {
                            state.groups.remove(uid);
                        }
                        removed
                    }
                    None => false,
                },
            }
        };
        if removed {
            tracing::trace!(uid, ?rid, "Removed component");
            self.changed();
        }
        removed
    }

    fn has_component(&self, uid: &str, rid: Option<&str>) -> bool {
        self.inner
            .state
            .read()
            .groups
            .get(uid)
            .is_some_and(|group| group.has(rid))
    }

    fn get_components_by_uid(&self, uid: &str) -> Vec<Arc<CalComponent>> {
        self.inner
            .state
            .read()
            .groups
            .get(uid)
            .map(ComponentGroup::components)
            .unwrap_or_default()
    }

    fn get_components(&self) -> Vec<Arc<CalComponent>> {
        self.inner
            .state
            .read()
            .groups
            .values()
            .flat_map(ComponentGroup::components)
            .collect()
    }

    fn get_component_ids(&self) -> Vec<ComponentId> {
        self.inner
            .state
            .read()
            .groups
            .iter()
            .flat_map(|(uid, group)| group.ids(uid))
            .collect()
    }

    fn get_timezone(&self, tzid: &str) -> Option<Timezone> {
        self.inner.state.read().timezones.get(tzid).cloned()
    }

    fn put_timezone(&self, timezone: &Timezone) -> bool {
        self.inner
            .state
            .write()
            .timezones
            .insert(timezone.tzid().to_string(), timezone.clone());
        self.changed();
        true
    }

    fn remove_timezone(&self, tzid: &str) -> bool {
        let removed = self.inner.state.write().timezones.remove(tzid).is_some();
        if removed {
            self.changed();
        }
        removed
    }

    fn get_timezones(&self) -> Vec<Timezone> {
        self.inner.state.read().timezones.values().cloned().collect()
    }

    fn get_key_value(&self, key: &str) -> Option<String> {
        self.inner.keys.get(key)
    }

    fn put_key_value(&self, key: &str, value: Option<&str>) -> bool {
        self.inner.keys.put(key, value)
    }

    fn freeze_changes(&self) {
        let depth = self.inner.frozen.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.keys.freeze();
        tracing::debug!(depth, "Changes frozen");
    }

    fn thaw_changes(&self) {
        let Ok(previous) = self
            .inner
            .frozen
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        else {
            tracing::warn!("Changes thawed without a matching freeze");
            return;
        };
        self.inner.keys.thaw();
        tracing::debug!(depth = previous - 1, "Changes thawed");
        if previous == 1 && self.is_dirty() {
            self.flush_logged();
        }
    }

    fn remove(&self) -> bool {
        self.inner.scheduler.cancel();
        let _writer = self.inner.save_lock.lock();
        {
            let mut state = self.inner.state.write();
            state.groups.clear();
            state.timezones.clear();
        }
        self.inner.dirty.store(false, Ordering::SeqCst);

        let files = [
            self.inner.calendar_path.clone(),
            temp_path(&self.inner.calendar_path),
        ];
        let mut ok = true;
        for path in &files {
            if let Err(err) = remove_if_exists(path) {
                tracing::warn!(path = %path.display(), %err, "Failed to delete store file");
                ok = false;
            }
        }
        if let Err(err) = self.inner.keys.remove() {
            tracing::warn!(%err, "Failed to delete key file");
            ok = false;
        }
        tracing::debug!(dir = %self.inner.dir.display(), ok, "Removed store");
        ok
    }

    fn clean(&self) -> bool {
        self.inner.scheduler.cancel();
        let _writer = self.inner.save_lock.lock();
        let keys_ok = self.inner.keys.clean();
        {
            let mut state = self.inner.state.write();
            state.groups.clear();
            state.timezones.clear();
        }
        self.inner.dirty.store(true, Ordering::SeqCst);
        match self.inner.write_calendar() {
            Ok(()) => keys_ok,
            Err(err) => {
                tracing::warn!(path = %self.inner.calendar_path.display(), %err, "Failed to save calendar");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(uid: &str, rid: Option<&str>) -> CalComponent {
        let mut text = format!("BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{uid}\r\n");
        if let Some(rid) = rid {
            text.push_str(&format!("RECURRENCE-ID:{rid}\r\n"));
        }
        text.push_str("END:VEVENT\r\n");
        CalComponent::from_ical_string(&text).unwrap()
    }

    fn quick() -> FileStoreOptions {
        FileStoreOptions {
            save_delay: Duration::from_millis(30),
        }
    }

    #[test]
    fn source_dirs() {
        assert_eq!(SourceKind::Events.dir_name(), "calendar");
        assert_eq!(SourceKind::Tasks.dir_name(), "tasks");
        assert_eq!(SourceKind::Memos.dir_name(), "memos");
        assert_eq!(
            FileStoreOptions::default().save_delay,
            Duration::from_secs(6)
        );
    }

    #[test]
    fn new_outside_runtime_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileStore::new(dir.path(), quick()).is_err());
    }

    #[test_log::test(tokio::test)]
    async fn for_source_uses_kind_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::for_source(dir.path(), SourceKind::Tasks, "work", quick()).unwrap();
        assert_eq!(store.dir(), dir.path().join("tasks").join("work"));
        assert!(store.load());
        assert!(store.dir().join(KEY_FILE_NAME).exists());
    }

    #[test_log::test(tokio::test)]
    async fn from_settings_rejects_empty_cache_dir() {
        let settings = StoreSettings {
            cache_dir: "  ".to_string(),
            save_delay_ms: 10,
        };
        assert!(FileStore::from_settings(&settings, SourceKind::Events, "x").is_err());
    }

    #[test_log::test(tokio::test)]
    async fn put_without_uid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), quick()).unwrap();
        assert!(store.load());

        let nameless = CalComponent::from_ical_string("BEGIN:VJOURNAL\r\nEND:VJOURNAL\r\n").unwrap();
        assert!(!store.put_component(nameless));
        assert!(!store.is_dirty());
        assert!(!store.pending_save());
    }

    #[test_log::test(tokio::test)]
    async fn override_only_group_is_deleted_when_emptied() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), quick()).unwrap();
        assert!(store.load());

        assert!(store.put_component(event("a", Some("r1"))));
        assert!(!store.has_component("a", None));
        assert!(store.remove_component("a", Some("r1")));
        assert!(store.get_component_ids().is_empty());
        assert!(!store.remove_component("a", Some("r1")));
    }

    #[test_log::test(tokio::test)]
    async fn snapshot_orders_timezones_then_groups() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), quick()).unwrap();
        assert!(store.load());

        assert!(store.put_component(event("b", None)));
        assert!(store.put_component(event("a", Some("r2"))));
        assert!(store.put_component(event("a", None)));
        assert!(store.put_timezone(&Timezone::fixed("Z/Second", 0)));
        assert!(store.put_timezone(&Timezone::fixed("A/First", 3600)));
        store.flush().unwrap();

        let text = fs::read_to_string(store.calendar_path()).unwrap();
        let calendar = parse(&text).unwrap();
        let order: Vec<String> = calendar
            .components()
            .iter()
            .map(|c| {
                c.tzid()
                    .or_else(|| c.uid())
                    .unwrap_or_default()
                    .to_string()
                    + c.recurrence_id().unwrap_or_default()
            })
            .collect();
        assert_eq!(order, vec!["A/First", "Z/Second", "a", "ar2", "b"]);
        assert!(!store.pending_save());
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn save_waiting_on_remove_does_not_recreate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cal"), quick()).unwrap();
        assert!(store.load());

        let writer = store.inner.save_lock.lock();
        assert!(store.put_component(event("doomed", None)));
        // The timer fires and the save blocks on the writer lock.
        std::thread::sleep(Duration::from_millis(200));
        assert!(!store.pending_save());

        std::thread::scope(|scope| {
            let remover = scope.spawn(|| store.remove());
            std::thread::sleep(Duration::from_millis(50));
            drop(writer);
            assert!(remover.join().unwrap());
        });
        std::thread::sleep(Duration::from_millis(200));

        assert!(!store.calendar_path().exists());
        assert!(!store.dir().exists());
        assert!(store.get_component_ids().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn failed_save_keeps_store_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cal"), quick()).unwrap();
        assert!(store.load());
        assert!(store.put_component(event("a", None)));

        // A directory squatting on the temp name makes the write fail.
        fs::create_dir_all(temp_path(store.calendar_path()).join("block")).unwrap();
        assert!(store.flush().is_err());
        assert!(store.is_dirty());
        assert_eq!(store.saves(), 0);

        fs::remove_dir_all(temp_path(store.calendar_path())).unwrap();
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.saves(), 1);
    }
}
