//! Proxies for DBus services, so we can call them.
//!
//! The proxies follow the interface XML published by the freedesktop.org StatusNotifierItem
//! specification (the copies shipped with Waybar are a convenient reference). `dbus_menu.xml` is
//! not used: menus are exposed to the renderer by bus name and object path only.
//!
//! For more information, see ["Writing a client proxy" in the zbus
//! tutorial](https://dbus2.github.io/zbus/).

mod dbus_status_notifier_item;
pub use dbus_status_notifier_item::*;

mod dbus_status_notifier_watcher;
pub use dbus_status_notifier_watcher::*;
