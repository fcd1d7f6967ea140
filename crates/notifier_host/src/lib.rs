//! The system tray side of the [StatusNotifierItem] specification: registering as a
//! StatusNotifierHost, tracking items as they come and go, reading their properties, and
//! optionally running a StatusNotifierWatcher if the session does not have one yet.
//!
//! [StatusNotifierItem]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/

pub mod proxy;

mod error;
pub use error::*;

mod host;
pub use host::*;

mod icon;
pub use icon::*;

mod item;
pub use item::*;

pub mod names;

mod watcher;
pub use watcher::*;
