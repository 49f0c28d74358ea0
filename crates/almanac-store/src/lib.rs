//! Calendar component storage: an interval-indexed store interface and a
//! file-backed implementation with debounced, crash-safe persistence.

pub mod component;
pub mod error;
pub mod file_store;
pub mod group;
pub mod interval_tree;
pub mod key_file;
pub mod occurrence;
mod persist;
pub mod scheduler;
pub mod store;

pub use component::{CalComponent, ComponentId, Timezone};
pub use error::{StoreError, StoreResult};
pub use file_store::{FileStore, FileStoreOptions, SourceKind};
pub use group::ComponentGroup;
pub use interval_tree::IntervalTree;
pub use store::{CalendarStore, ComponentStore, FreezeGuard};
