use std::{cell::RefCell, rc::Rc};

use islandbar_shared_util::{HandlerId, ItemId};
use serde::{Deserialize, Serialize};

use super::{
    affordance::{resolve_affordance, Affordance, FallbackMenuEntry},
    icon::{resolve_icon, IconSource},
    ItemSignal, ItemStatus, TrayItem,
};
use crate::probe::SystemProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "menu", rename_all = "snake_case")]
pub enum ClickOutcome {
    Activated,
    /// The renderer should pop up the menu described by the affordance.
    ShowMenu(Affordance),
    Ignored,
}

/// Serialized state of one tray entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrayEntryView {
    pub id: ItemId,
    pub icon: Option<IconSource>,
    pub tooltip_markup: String,
    pub status: ItemStatus,
    pub affordance: Affordance,
}

#[derive(Debug)]
struct WidgetState {
    icon: Option<IconSource>,
    tooltip_markup: String,
    status: ItemStatus,
}

/// The bar's representation of one live tray item.
///
/// Keeps its icon and tooltip current by listening to the item's `ready`, `changed` and
/// `tooltip-changed` signals, and disconnects from them when dropped.
pub struct TrayItemWidget {
    item: Rc<dyn TrayItem>,
    id: ItemId,
    affordance: Affordance,
    state: Rc<RefCell<WidgetState>>,
    handlers: Vec<HandlerId>,
    probe: Rc<dyn SystemProbe>,
}

impl std::fmt::Debug for TrayItemWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrayItemWidget")
            .field("id", &self.id)
            .field("affordance", &self.affordance)
            .field("state", &self.state)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl TrayItemWidget {
    /// `on_update` is called whenever the icon, status or tooltip of the widget changed.
    pub fn new(item: Rc<dyn TrayItem>, probe: Rc<dyn SystemProbe>, on_update: Rc<dyn Fn()>) -> Self {
        let id = item.item_id();
        let affordance = resolve_affordance(item.as_ref(), probe.as_ref());
        let state = Rc::new(RefCell::new(WidgetState {
            icon: resolve_icon(item.as_ref(), probe.as_ref()),
            tooltip_markup: item.tooltip_markup(),
            status: item.status(),
        }));

        let mut handlers = Vec::with_capacity(3);
        for signal in [ItemSignal::Ready, ItemSignal::Changed] {
            let item_ref = Rc::downgrade(&item);
            let state_ref = Rc::downgrade(&state);
            let probe = probe.clone();
            let on_update = on_update.clone();
            handlers.push(item.connect(
                signal,
                Box::new(move || {
                    let (Some(item), Some(state)) = (item_ref.upgrade(), state_ref.upgrade()) else { return };
                    let icon_changed = refresh_icon(item.as_ref(), probe.as_ref(), &state);
                    let status = item.status();
                    let status_changed = std::mem::replace(&mut state.borrow_mut().status, status) != status;
                    if icon_changed || status_changed {
                        on_update();
                    }
                }),
            ));
        }
        {
            let item_ref = Rc::downgrade(&item);
            let state_ref = Rc::downgrade(&state);
            handlers.push(item.connect(
                ItemSignal::TooltipChanged,
                Box::new(move || {
                    let (Some(item), Some(state)) = (item_ref.upgrade(), state_ref.upgrade()) else { return };
                    let markup = item.tooltip_markup();
                    let changed = state.borrow().tooltip_markup != markup;
                    if changed {
                        state.borrow_mut().tooltip_markup = markup;
                        on_update();
                    }
                }),
            ));
        }

        TrayItemWidget { item, id, affordance, state, handlers, probe }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn view(&self) -> TrayEntryView {
        let state = self.state.borrow();
        TrayEntryView {
            id: self.id.clone(),
            icon: state.icon.clone(),
            tooltip_markup: state.tooltip_markup.clone(),
            status: state.status,
            affordance: self.affordance.clone(),
        }
    }

    pub fn click(&self, button: MouseButton) -> ClickOutcome {
        if self.affordance.shows_menu() {
            return match button {
                MouseButton::Primary => ClickOutcome::ShowMenu(self.affordance.clone()),
                MouseButton::Secondary => ClickOutcome::Ignored,
            };
        }
        match button {
            MouseButton::Primary => self.item.activate(2, 2),
            MouseButton::Secondary => self.item.secondary_activate(0, 0),
        }
        ClickOutcome::Activated
    }

    /// Run an entry of the fallback menu. Returns `false` if this widget doesn't show the fallback
    /// menu.
    pub fn menu_entry(&self, entry: FallbackMenuEntry) -> bool {
        let Affordance::ClaimedMenuFallback { process_name } = &self.affordance else {
            return false;
        };
        match entry {
            FallbackMenuEntry::Open => match process_name {
                Some(process_name) => {
                    crate::print_result_err!(
                        format!("launching {}", process_name),
                        self.probe.spawn_detached(process_name, &[])
                    );
                }
                None => log::debug!("No process known for {}, not opening anything", self.id),
            },
            FallbackMenuEntry::Quit => self.item.activate(0, 0),
        }
        true
    }
}

impl Drop for TrayItemWidget {
    fn drop(&mut self) {
        for handler in self.handlers.drain(..) {
            self.item.disconnect(handler);
        }
    }
}

/// Re-resolve the icon of an item. A failed resolution keeps the previous icon.
fn refresh_icon(item: &dyn TrayItem, probe: &dyn SystemProbe, state: &RefCell<WidgetState>) -> bool {
    let Some(icon) = resolve_icon(item, probe) else {
        return false;
    };
    let changed = state.borrow().icon.as_ref() != Some(&icon);
    if changed {
        state.borrow_mut().icon = Some(icon);
    }
    changed
}
