//! Well-known names and object paths used by the StatusNotifier protocol.

pub const WATCHER_BUS: &str = "org.kde.StatusNotifierWatcher";
pub const WATCHER_OBJECT: &str = "/StatusNotifierWatcher";

pub const ITEM_OBJECT: &str = "/StatusNotifierItem";
