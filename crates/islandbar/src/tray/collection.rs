use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use islandbar_shared_util::{HandlerId, ItemId};
use serde::Serialize;
use tokio::sync::watch;

use super::{
    affordance::FallbackMenuEntry,
    item_widget::{ClickOutcome, MouseButton, TrayEntryView, TrayItemWidget},
    Tray,
};
use crate::probe::SystemProbe;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrayView {
    /// The tray is hidden when it has no items.
    pub visible: bool,
    pub items: Vec<TrayEntryView>,
}

#[cfg(test)]
impl TrayView {
    pub fn keys(&self) -> Vec<&ItemId> {
        self.items.iter().map(|item| &item.id).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrayActionError {
    #[error("No tray item with id {0}")]
    NoSuchItem(ItemId),
    #[error("Tray item {0} does not show a fallback menu")]
    NoFallbackMenu(ItemId),
}

struct Inner {
    tray: Rc<dyn Tray>,
    probe: Rc<dyn SystemProbe>,
    widgets: RefCell<Vec<TrayItemWidget>>,
    view: watch::Sender<TrayView>,
}

impl Inner {
    /// Throw away every widget and build new ones for the items the tray has now.
    fn rebuild(self: &Rc<Self>) {
        // dropping the old widgets disconnects their handlers
        self.widgets.borrow_mut().clear();

        let on_update: Rc<dyn Fn()> = {
            let inner: Weak<Inner> = Rc::downgrade(self);
            Rc::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.publish();
                }
            })
        };
        let widgets = self
            .tray
            .items()
            .into_iter()
            .map(|item| TrayItemWidget::new(item, self.probe.clone(), on_update.clone()))
            .collect::<Vec<_>>();
        log::debug!("Tray now has {} items", widgets.len());
        *self.widgets.borrow_mut() = widgets;
        self.publish();
    }

    fn publish(&self) {
        let items = self.widgets.borrow().iter().map(TrayItemWidget::view).collect::<Vec<_>>();
        let view = TrayView { visible: !items.is_empty(), items };
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

/// Keeps one [`TrayItemWidget`] per item of the tray, and publishes the resulting [`TrayView`].
pub struct TrayCollectionController {
    inner: Rc<Inner>,
    items_handler: HandlerId,
}

impl TrayCollectionController {
    pub fn new(tray: Rc<dyn Tray>, probe: Rc<dyn SystemProbe>) -> Self {
        let inner = Rc::new(Inner {
            tray: tray.clone(),
            probe,
            widgets: RefCell::new(Vec::new()),
            view: watch::Sender::new(TrayView::default()),
        });
        let items_handler = {
            let weak = Rc::downgrade(&inner);
            tray.connect_items_changed(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.rebuild();
                }
            }))
        };
        inner.rebuild();
        TrayCollectionController { inner, items_handler }
    }

    pub fn view(&self) -> watch::Receiver<TrayView> {
        self.inner.view.subscribe()
    }

    pub fn current_view(&self) -> TrayView {
        self.inner.view.borrow().clone()
    }

    pub fn click(&self, id: &ItemId, button: MouseButton) -> Result<ClickOutcome, TrayActionError> {
        let widgets = self.inner.widgets.borrow();
        let widget = widgets.iter().find(|w| w.id() == id).ok_or_else(|| TrayActionError::NoSuchItem(id.clone()))?;
        Ok(widget.click(button))
    }

    pub fn menu_entry(&self, id: &ItemId, entry: FallbackMenuEntry) -> Result<(), TrayActionError> {
        let widgets = self.inner.widgets.borrow();
        let widget = widgets.iter().find(|w| w.id() == id).ok_or_else(|| TrayActionError::NoSuchItem(id.clone()))?;
        if widget.menu_entry(entry) {
            Ok(())
        } else {
            Err(TrayActionError::NoFallbackMenu(id.clone()))
        }
    }
}

impl Drop for TrayCollectionController {
    fn drop(&mut self) {
        self.inner.tray.disconnect(self.items_handler);
        self.inner.widgets.borrow_mut().clear();
    }
}
