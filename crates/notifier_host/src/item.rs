use crate::*;

use serde::Deserialize;
use zbus::fdo::IntrospectableProxy;

/// Recognised values of [`org.freedesktop.StatusNotifierItem.Status`].
///
/// [`org.freedesktop.StatusNotifierItem.Status`]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierItem/#org.freedesktop.statusnotifieritem.status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The item doesn't convey important information to the user, it can be considered an "idle"
    /// status and is likely that visualizations will chose to hide it.
    Passive,
    /// The item is active, is more important that the item will be shown in some way to the user.
    Active,
    /// The item carries really important information for the user, such as battery charge running
    /// out and is wants to incentive the direct user intervention. Visualizations should emphasize
    /// in some way the items with NeedsAttention status.
    NeedsAttention,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParseStatusError;

impl std::str::FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, ParseStatusError> {
        match s {
            "Passive" => Ok(Status::Passive),
            "Active" => Ok(Status::Active),
            "NeedsAttention" => Ok(Status::NeedsAttention),
            _ => Err(ParseStatusError),
        }
    }
}

/// Tooltip of an item, with empty strings normalized away where they mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolTip {
    pub icon_name: Option<String>,
    pub title: String,
    pub description: String,
}

impl From<proxy::RawToolTip> for ToolTip {
    fn from((icon_name, _pixmaps, title, description): proxy::RawToolTip) -> Self {
        ToolTip { icon_name: non_empty(icon_name), title, description }
    }
}

/// A snapshot of the properties of an item that matter for displaying it.
///
/// Properties an item doesn't implement are left at their default.
#[derive(Debug, Clone, Default)]
pub struct ItemProperties {
    pub title: String,
    pub status: Option<Status>,
    pub icon_name: Option<String>,
    pub icon_theme_path: Option<String>,
    pub icon_pixmaps: Vec<proxy::RawPixmap>,
    pub tool_tip: Option<ToolTip>,
    pub item_is_menu: bool,
    /// Object path of the item's `com.canonical.dbusmenu` menu, if it exports a usable one.
    pub menu: Option<String>,
}

/// A StatusNotifierItem (SNI).
///
/// At the moment, this does not wrap much of the SNI's properties and methods. As such, you should
/// directly access the `sni` member as needed for functionalty that is not provided.
pub struct Item {
    /// The StatusNotifierItem that is wrapped by this instance.
    pub sni: proxy::StatusNotifierItemProxy<'static>,
}

impl Item {
    /// Create an instance from the service's address.
    ///
    /// The format of `addr` is `{bus}{object_path}` (e.g.
    /// `:1.50/org/ayatana/NotificationItem/nm_applet`), which is the format that is used for
    /// StatusNotifierWatcher's [RegisteredStatusNotifierItems property][rsni]).
    ///
    /// [rsni]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierWatcher/#registeredstatusnotifieritems
    pub async fn from_address(con: &zbus::Connection, service: &str) -> Result<Self> {
        let (addr, path) = {
            if let Some((addr, path)) = service.split_once('/') {
                (addr.to_owned(), format!("/{}", path))
            } else if service.starts_with(':') {
                (
                    service.to_owned(),
                    resolve_pathless_address(con, service, "/".to_owned())
                        .await?
                        .ok_or_else(|| Error::DbusAddressError(service.to_owned()))?,
                )
            } else {
                return Err(Error::DbusAddressError(service.to_owned()));
            }
        };

        // Items announce changes through their own New* signals instead of PropertiesChanged, so
        // cached properties would go stale.
        let sni = proxy::StatusNotifierItemProxy::builder(con)
            .destination(addr)?
            .path(path)?
            .cache_properties(zbus::CacheProperties::No)
            .build()
            .await?;

        Ok(Self { sni })
    }

    /// Name of the bus connection that owns this item.
    pub fn destination(&self) -> String {
        self.sni.destination().to_string()
    }

    /// Fetch all display-relevant properties. Each property is fetched independently; a property
    /// that can't be read is logged and left at its default.
    pub async fn properties(&self) -> ItemProperties {
        let dest = self.destination();
        let title = optional_property(&dest, "Title", self.sni.title().await).unwrap_or_default();
        let status = optional_property(&dest, "Status", self.sni.status().await).and_then(|s| s.parse().ok());
        let icon_name = optional_property(&dest, "IconName", self.sni.icon_name().await).and_then(non_empty);
        let icon_theme_path =
            optional_property(&dest, "IconThemePath", self.sni.icon_theme_path().await).and_then(non_empty);
        let icon_pixmaps = optional_property(&dest, "IconPixmap", self.sni.icon_pixmap().await).unwrap_or_default();
        let tool_tip = optional_property(&dest, "ToolTip", self.sni.tool_tip().await).map(ToolTip::from);
        let item_is_menu = optional_property(&dest, "ItemIsMenu", self.sni.item_is_menu().await).unwrap_or(false);
        let menu = optional_property(&dest, "Menu", self.sni.menu().await)
            .map(|path| path.as_str().to_owned())
            .filter(|path| is_usable_menu_path(path));

        ItemProperties { title, status, icon_name, icon_theme_path, icon_pixmaps, tool_tip, item_is_menu, menu }
    }
}

/// Treat a property error that just means "not implemented by this item" as absent, and log
/// anything else.
fn optional_property<T>(destination: &str, name: &str, result: zbus::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(zbus::Error::FDO(e)) => match *e {
            zbus::fdo::Error::UnknownProperty(_) | zbus::fdo::Error::InvalidArgs(_) => None,
            // this error is reported by discord, blueman-applet
            zbus::fdo::Error::Failed(msg) if msg == "error occurred in Get" => None,
            e => {
                log::warn!("failed to read {} of {}: {}", name, destination, e);
                None
            }
        },
        Err(e) => {
            log::warn!("failed to read {} of {}: {}", name, destination, e);
            None
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Some items export `/` or `/NO_DBUSMENU` to say they don't have a menu.
fn is_usable_menu_path(path: &str) -> bool {
    !path.is_empty() && path != "/" && path != "/NO_DBUSMENU"
}

#[derive(Deserialize)]
struct DBusNode {
    #[serde(default)]
    interface: Vec<DBusInterface>,

    #[serde(default)]
    node: Vec<DBusNode>,

    #[serde(rename = "@name")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct DBusInterface {
    #[serde(rename = "@name")]
    name: String,
}

async fn resolve_pathless_address(con: &zbus::Connection, service: &str, path: String) -> Result<Option<String>> {
    let introspection_xml =
        IntrospectableProxy::builder(con).destination(service)?.path(path.as_str())?.build().await?.introspect().await?;

    let dbus_node = quick_xml::de::from_str::<DBusNode>(&introspection_xml)
        .map_err(|err| Error::Introspection { service: service.to_owned(), message: err.to_string() })?;

    if dbus_node.interface.iter().any(|interface| interface.name == "org.kde.StatusNotifierItem") {
        // This item implements the desired interface, so bubble it back up
        Ok(Some(path))
    } else {
        for node in dbus_node.node {
            if let Some(name) = node.name {
                if name == "StatusNotifierItem" {
                    // If this exists, then there's a good chance DBus may not think anything
                    // implements the desired interface, so just bubble this up instead.
                    return Ok(Some(join_to_path(&path, name)));
                }

                let path = Box::pin(resolve_pathless_address(con, service, join_to_path(&path, name))).await?;

                if path.is_some() {
                    return Ok(path);
                }
            }
        }

        Ok(None)
    }
}

fn join_to_path(path: &str, name: String) -> String {
    // Make sure we don't double-up on the leading slash
    format!("{path}/{name}", path = if path == "/" { "" } else { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!("NeedsAttention".parse(), Ok(Status::NeedsAttention));
        assert_eq!("active".parse::<Status>(), Err(ParseStatusError));
    }

    #[test]
    fn test_tool_tip_normalizes_empty_icon_name() {
        let tip = ToolTip::from((String::new(), vec![], "Title".to_owned(), String::new()));
        assert_eq!(tip.icon_name, None);
        let tip = ToolTip::from(("nm-signal-100".to_owned(), vec![], "Wifi".to_owned(), "connected".to_owned()));
        assert_eq!(tip.icon_name.as_deref(), Some("nm-signal-100"));
    }

    #[test]
    fn test_menu_paths() {
        assert!(is_usable_menu_path("/MenuBar"));
        assert!(!is_usable_menu_path("/"));
        assert!(!is_usable_menu_path("/NO_DBUSMENU"));
    }

    #[test]
    fn test_join_to_path() {
        assert_eq!(join_to_path("/", "StatusNotifierItem".to_owned()), "/StatusNotifierItem");
        assert_eq!(join_to_path("/org/ayatana", "nm".to_owned()), "/org/ayatana/nm");
    }
}
