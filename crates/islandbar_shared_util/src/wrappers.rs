use derive_more::{AsRef, Display, From, FromStr};
use serde::{Deserialize, Serialize};

/// Identifier of a tray item, in the `{bus}{object_path}` form the StatusNotifierWatcher hands out
/// (e.g. `:1.50/org/ayatana/NotificationItem/nm_applet`).
#[repr(transparent)]
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsRef, From, FromStr, Display, derive_more::Debug)]
#[debug("ItemId({})", _0)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// The bus address part of the id, i.e. everything before the first `/`.
    pub fn bus_address(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_owned())
    }
}

/// Address of a compositor window, normalized to not carry a `0x` prefix.
#[repr(transparent)]
#[derive(Clone, Hash, PartialEq, Eq, Serialize, Deserialize, AsRef, Display, derive_more::Debug)]
#[debug("WindowAddress({})", _0)]
#[serde(transparent)]
pub struct WindowAddress(String);

impl WindowAddress {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        WindowAddress(raw.strip_prefix("0x").unwrap_or(raw).to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WindowAddress {
    fn from(s: &str) -> Self {
        WindowAddress::new(s)
    }
}
