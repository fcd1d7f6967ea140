//! [`Tray`] implementation on top of the StatusNotifierItem DBus protocol.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use anyhow::{Context, Result};
use futures::StreamExt;
use itertools::Itertools;
use islandbar_shared_util::{HandlerId, ItemId, Signal};
use notifier_host::{proxy::StatusNotifierItemProxy, ItemProperties, Pixmap};
use tokio::task::JoinHandle;

use super::{ActionGroup, ItemSignal, ItemStatus, MenuModel, ThemedIcon, Tooltip, Tray, TrayItem};

/// Items of the session's StatusNotifierWatcher, in registration order.
#[derive(Default)]
pub struct SniTray {
    items: RefCell<Vec<Rc<SniTrayItem>>>,
    items_changed: Signal,
    host_task: RefCell<Option<JoinHandle<()>>>,
}

impl Tray for SniTray {
    fn items(&self) -> Vec<Rc<dyn TrayItem>> {
        self.items.borrow().iter().map(|item| item.clone() as Rc<dyn TrayItem>).collect()
    }

    fn connect_items_changed(&self, handler: Box<dyn Fn()>) -> HandlerId {
        self.items_changed.connect(move |_| handler())
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        self.items_changed.disconnect(id)
    }
}

impl Drop for SniTray {
    fn drop(&mut self) {
        if let Some(task) = self.host_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Start serving as a StatusNotifierHost, and a StatusNotifierWatcher if nobody else is one yet.
///
/// Must be called from within a [`tokio::task::LocalSet`]. The returned tray is empty until the
/// DBus setup finished.
pub fn spawn_tray(icon_size: i32) -> Rc<SniTray> {
    let tray = Rc::new(SniTray::default());
    let host = TrayHost { tray: Rc::downgrade(&tray), icon_size };
    let task = tokio::task::spawn_local(async move {
        let result = run_tray(host).await;
        crate::print_result_err!("while running the system tray", result);
    });
    *tray.host_task.borrow_mut() = Some(task);
    tray
}

async fn run_tray(mut host: TrayHost) -> Result<()> {
    let con = zbus::Connection::session().await.context("Failed to connect to the DBus session bus")?;
    if let Err(err) = notifier_host::Watcher::new().attach_to(&con).await {
        log::warn!("Could not start a StatusNotifierWatcher: {}", err);
    }
    let (name, snw) = notifier_host::register_as_host(&con).await.context("Failed to register as StatusNotifierHost")?;
    log::info!("Registered tray as {}", name);

    let err = notifier_host::run_host(&mut host, &snw).await;
    Err(err).context("StatusNotifierHost stopped")
}

struct TrayHost {
    tray: Weak<SniTray>,
    icon_size: i32,
}

impl notifier_host::Host for TrayHost {
    fn add_item(&mut self, id: &str, item: notifier_host::Item) {
        let Some(tray) = self.tray.upgrade() else { return };
        let item = SniTrayItem::spawn(ItemId::from(id), item, self.icon_size);
        {
            let mut items = tray.items.borrow_mut();
            match items.iter_mut().find(|existing| existing.id.as_str() == id) {
                Some(existing) => *existing = item,
                None => items.push(item),
            }
        }
        tray.items_changed.emit(&());
    }

    fn remove_item(&mut self, id: &str) {
        let Some(tray) = self.tray.upgrade() else { return };
        let removed = {
            let mut items = tray.items.borrow_mut();
            let len_before = items.len();
            items.retain(|item| item.id.as_str() != id);
            items.len() != len_before
        };
        if removed {
            tray.items_changed.emit(&());
        } else {
            log::warn!("Tried to remove nonexistent item {:?} from systray", id);
        }
    }
}

/// A single item, caching its properties and refreshing them when the item announces changes.
pub struct SniTrayItem {
    id: ItemId,
    sni: StatusNotifierItemProxy<'static>,
    icon_size: i32,
    properties: RefCell<ItemProperties>,
    ready: Signal,
    changed: Signal,
    tooltip_changed: Signal,
    task: RefCell<Option<JoinHandle<()>>>,
}

impl SniTrayItem {
    fn spawn(id: ItemId, item: notifier_host::Item, icon_size: i32) -> Rc<Self> {
        let this = Rc::new(SniTrayItem {
            id: id.clone(),
            sni: item.sni.clone(),
            icon_size,
            properties: RefCell::new(ItemProperties::default()),
            ready: Signal::new(),
            changed: Signal::new(),
            tooltip_changed: Signal::new(),
            task: RefCell::new(None),
        });
        let task = tokio::task::spawn_local({
            let this = Rc::downgrade(&this);
            async move {
                if let Err(e) = maintain(this, item).await {
                    log::error!("error for systray item {}: {}", id, e);
                }
            }
        });
        *this.task.borrow_mut() = Some(task);
        this
    }

    fn signal(&self, signal: ItemSignal) -> &Signal {
        match signal {
            ItemSignal::Ready => &self.ready,
            ItemSignal::Changed => &self.changed,
            ItemSignal::TooltipChanged => &self.tooltip_changed,
        }
    }

    fn call_later<F>(&self, what: &'static str, call: F)
    where
        F: std::future::Future<Output = zbus::Result<()>> + 'static,
    {
        let id = self.id.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = call.await {
                log::warn!("{} of {} failed: {}", what, id, e);
            }
        });
    }
}

impl Drop for SniTrayItem {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Store freshly fetched properties and notify listeners, unless the item is gone already.
fn update(item: &Weak<SniTrayItem>, properties: ItemProperties, signal: ItemSignal) -> bool {
    let Some(item) = item.upgrade() else { return false };
    *item.properties.borrow_mut() = properties;
    item.signal(signal).emit(&());
    true
}

async fn maintain(this: Weak<SniTrayItem>, item: notifier_host::Item) -> zbus::Result<()> {
    // listen before the first fetch, so no change falls in between
    let mut icon_updates = item.sni.receive_new_icon().await?;
    let mut attention_icon_updates = item.sni.receive_new_attention_icon().await?;
    let mut status_updates = item.sni.receive_new_status().await?;
    let mut title_updates = item.sni.receive_new_title().await?;
    let mut tool_tip_updates = item.sni.receive_new_tool_tip().await?;

    if !update(&this, item.properties().await, ItemSignal::Ready) {
        return Ok(());
    }

    loop {
        let signal = tokio::select! {
            Some(_) = icon_updates.next() => ItemSignal::Changed,
            Some(_) = attention_icon_updates.next() => ItemSignal::Changed,
            Some(_) = status_updates.next() => ItemSignal::Changed,
            Some(_) = title_updates.next() => ItemSignal::Changed,
            Some(_) = tool_tip_updates.next() => ItemSignal::TooltipChanged,
            else => break,
        };
        if !update(&this, item.properties().await, signal) {
            break;
        }
    }
    Ok(())
}

impl TrayItem for SniTrayItem {
    fn item_id(&self) -> ItemId {
        self.id.clone()
    }

    /// Only items that ship their own icon theme directory count as themed; a bare icon name is
    /// reported through [`TrayItem::icon_name`].
    fn themed_icon(&self) -> Option<ThemedIcon> {
        let properties = self.properties.borrow();
        match (&properties.icon_name, &properties.icon_theme_path) {
            (Some(name), Some(theme_path)) => Some(ThemedIcon { name: name.clone(), theme_path: Some(theme_path.clone()) }),
            _ => None,
        }
    }

    fn pixmap(&self) -> Option<Pixmap> {
        notifier_host::best_pixmap(self.properties.borrow().icon_pixmaps.clone(), self.icon_size)
    }

    fn icon_name(&self) -> Option<String> {
        self.properties.borrow().icon_name.clone()
    }

    fn tooltip(&self) -> Option<Tooltip> {
        self.properties.borrow().tool_tip.clone().map(|tip| Tooltip {
            icon_name: tip.icon_name,
            title: tip.title,
            description: tip.description,
        })
    }

    fn tooltip_markup(&self) -> String {
        let properties = self.properties.borrow();
        match &properties.tool_tip {
            Some(tip) if !(tip.title.is_empty() && tip.description.is_empty()) => {
                [&tip.title, &tip.description].iter().filter(|line| !line.is_empty()).join("\n")
            }
            _ => properties.title.clone(),
        }
    }

    fn status(&self) -> ItemStatus {
        self.properties.borrow().status.map(ItemStatus::from).unwrap_or_default()
    }

    fn menu_model(&self) -> Option<MenuModel> {
        let object_path = self.properties.borrow().menu.clone()?;
        Some(MenuModel { bus_name: self.sni.destination().to_string(), object_path })
    }

    /// dbusmenu exports the actions of its entries on the menu object itself.
    fn action_group(&self) -> Option<ActionGroup> {
        let object_path = self.properties.borrow().menu.clone()?;
        Some(ActionGroup { bus_name: self.sni.destination().to_string(), object_path })
    }

    fn is_menu(&self) -> bool {
        self.properties.borrow().item_is_menu
    }

    fn activate(&self, x: i32, y: i32) {
        let sni = self.sni.clone();
        self.call_later("Activate", async move { sni.activate(x, y).await });
    }

    fn secondary_activate(&self, x: i32, y: i32) {
        let sni = self.sni.clone();
        self.call_later("SecondaryActivate", async move { sni.secondary_activate(x, y).await });
    }

    fn connect(&self, signal: ItemSignal, handler: Box<dyn Fn()>) -> HandlerId {
        self.signal(signal).connect(move |_| handler())
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        [&self.ready, &self.changed, &self.tooltip_changed].iter().any(|signal| signal.disconnect(id))
    }
}
