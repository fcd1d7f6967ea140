use serde::{Deserialize, Serialize};

use super::{ActionGroup, MenuModel, TrayItem};
use crate::probe::{self, SystemProbe};

/// Prefix under which the actions of an item's menu are registered.
pub const MENU_ACTION_NAMESPACE: &str = "dbusmenu";

/// How a tray entry reacts to being clicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Affordance {
    /// The item exports a menu, shown on primary click.
    Menu {
        model: MenuModel,
        actions: ActionGroup,
        action_namespace: &'static str,
    },
    /// The item claims to only show a menu, but doesn't export one. A menu with [`FallbackMenuEntry`]s
    /// is shown instead.
    ClaimedMenuFallback { process_name: Option<String> },
    /// Primary click activates the item, secondary click secondary-activates it.
    PlainActivatable,
}

impl Affordance {
    pub fn shows_menu(&self) -> bool {
        !matches!(self, Affordance::PlainActivatable)
    }
}

pub fn resolve_affordance(item: &dyn TrayItem, probe: &dyn SystemProbe) -> Affordance {
    if let (Some(model), Some(actions)) = (item.menu_model(), item.action_group()) {
        Affordance::Menu { model, actions, action_namespace: MENU_ACTION_NAMESPACE }
    } else if item.is_menu() {
        let process_name = probe::process_name_for_bus_address(probe, item.item_id().bus_address());
        Affordance::ClaimedMenuFallback { process_name }
    } else {
        Affordance::PlainActivatable
    }
}

/// Entries of the menu shown for [`Affordance::ClaimedMenuFallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMenuEntry {
    /// Launch another instance of the owning program, which usually raises its window.
    Open,
    Quit,
}

impl FallbackMenuEntry {
    pub fn label(self) -> &'static str {
        match self {
            FallbackMenuEntry::Open => "Open",
            FallbackMenuEntry::Quit => "Quit",
        }
    }
}
