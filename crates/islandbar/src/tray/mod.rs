//! System tray: the collaborator traits the bar consumes, icon and interaction resolution per item,
//! and the controller that keeps one widget per live item.

use std::rc::Rc;

use islandbar_shared_util::{HandlerId, ItemId};
use notifier_host::Pixmap;
use serde::Serialize;

pub mod affordance;
pub mod collection;
pub mod icon;
pub mod item_widget;
pub mod sni;

/// An icon to be looked up by name in an icon theme, optionally in an extra theme directory the item
/// ships itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemedIcon {
    pub name: String,
    pub theme_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub icon_name: Option<String>,
    pub title: String,
    pub description: String,
}

/// A remote menu exported by an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuModel {
    pub bus_name: String,
    pub object_path: String,
}

/// The actions the entries of a [`MenuModel`] trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionGroup {
    pub bus_name: String,
    pub object_path: String,
}

/// How important an item currently is. Renderers usually hide passive items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Passive,
    #[default]
    Active,
    NeedsAttention,
}

impl From<notifier_host::Status> for ItemStatus {
    fn from(status: notifier_host::Status) -> Self {
        match status {
            notifier_host::Status::Passive => ItemStatus::Passive,
            notifier_host::Status::Active => ItemStatus::Active,
            notifier_host::Status::NeedsAttention => ItemStatus::NeedsAttention,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemSignal {
    /// The item finished loading its properties.
    Ready,
    /// Icon, status or title changed.
    Changed,
    TooltipChanged,
}

pub trait TrayItem {
    /// `{bus address}{object path}`
    fn item_id(&self) -> ItemId;

    fn themed_icon(&self) -> Option<ThemedIcon>;

    fn pixmap(&self) -> Option<Pixmap>;

    fn icon_name(&self) -> Option<String>;

    fn tooltip(&self) -> Option<Tooltip>;

    fn tooltip_markup(&self) -> String;

    /// Items that don't report a status are treated as active.
    fn status(&self) -> ItemStatus;

    fn menu_model(&self) -> Option<MenuModel>;

    fn action_group(&self) -> Option<ActionGroup>;

    /// Whether the item says it only supports showing a menu, not activation.
    fn is_menu(&self) -> bool;

    fn activate(&self, x: i32, y: i32);

    fn secondary_activate(&self, x: i32, y: i32);

    fn connect(&self, signal: ItemSignal, handler: Box<dyn Fn()>) -> HandlerId;

    fn disconnect(&self, id: HandlerId) -> bool;
}

pub trait Tray {
    /// Live items, in tray order.
    fn items(&self) -> Vec<Rc<dyn TrayItem>>;

    fn connect_items_changed(&self, handler: Box<dyn Fn()>) -> HandlerId;

    fn disconnect(&self, id: HandlerId) -> bool;
}
