/// File and key names shared by every store backend
pub const CALENDAR_FILE_NAME: &str = "calendar.ics";
pub const KEY_FILE_NAME: &str = "keys.json";

/// Suffix of the scratch file written before it is renamed over the target.
pub const TEMP_FILE_SUFFIX: &str = "~";

/// Reserved key-value entry holding the default timezone id.
pub const DEFAULT_ZONE_KEY: &str = "default-zone";

/// Quiescence window before a dirty store is written back.
pub const DEFAULT_SAVE_DELAY_MS: u64 = 6_000;

pub const PRODUCT_NAME: &str = "Almanac Calendar Store";
pub const PRODUCT_ID: &str = const_str::concat!("-//Almanac//", PRODUCT_NAME, "//EN");
