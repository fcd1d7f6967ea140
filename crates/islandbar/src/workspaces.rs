//! Publishes which of the numbered workspaces is active.

use std::rc::{Rc, Weak};

use islandbar_shared_util::HandlerId;
use serde::Serialize;
use tokio::sync::watch;

use crate::compositor::Compositor;

/// The workspace buttons of the bar always show workspaces `1..=WORKSPACE_COUNT`.
pub const WORKSPACE_COUNT: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceEntry {
    pub id: u8,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspacesView {
    /// Id of the active workspace, even if it is not one of the numbered ones.
    pub active: Option<i32>,
    pub items: Vec<WorkspaceEntry>,
}

impl WorkspacesView {
    pub fn new(active: Option<i32>) -> Self {
        let items = (1..=WORKSPACE_COUNT).map(|id| WorkspaceEntry { id, active: active == Some(i32::from(id)) }).collect();
        WorkspacesView { active, items }
    }
}

struct Inner {
    compositor: Rc<dyn Compositor>,
    active: watch::Sender<Option<i32>>,
}

pub struct WorkspaceTracker {
    inner: Rc<Inner>,
    handler: HandlerId,
}

impl WorkspaceTracker {
    pub fn new(compositor: Rc<dyn Compositor>) -> Self {
        let inner = Rc::new(Inner { compositor: compositor.clone(), active: watch::Sender::new(compositor.active_workspace()) });
        let handler = {
            let weak: Weak<Inner> = Rc::downgrade(&inner);
            compositor.connect_active_workspace_changed(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let active = inner.compositor.active_workspace();
                    inner.active.send_if_modified(|current| std::mem::replace(current, active) != active);
                }
            }))
        };
        WorkspaceTracker { inner, handler }
    }

    pub fn active(&self) -> watch::Receiver<Option<i32>> {
        self.inner.active.subscribe()
    }

    pub fn current_view(&self) -> WorkspacesView {
        WorkspacesView::new(*self.inner.active.borrow())
    }
}

impl Drop for WorkspaceTracker {
    fn drop(&mut self) {
        self.inner.compositor.disconnect(self.handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus_tracker::test_util::FakeCompositor;
    use pretty_assertions::assert_eq;

    fn active_ids(view: &WorkspacesView) -> Vec<u8> {
        view.items.iter().filter(|entry| entry.active).map(|entry| entry.id).collect()
    }

    #[test]
    fn test_view_marks_active_workspace() {
        let view = WorkspacesView::new(Some(3));
        assert_eq!(view.items.len(), 10);
        assert_eq!(view.items.first().map(|entry| entry.id), Some(1));
        assert_eq!(view.items.last().map(|entry| entry.id), Some(10));
        assert_eq!(active_ids(&view), vec![3]);

        assert_eq!(active_ids(&WorkspacesView::new(Some(-98))), Vec::<u8>::new());
        assert_eq!(active_ids(&WorkspacesView::new(None)), Vec::<u8>::new());
    }

    #[test]
    fn test_tracker_follows_compositor() {
        let compositor = Rc::new(FakeCompositor::default());
        compositor.workspace.set(Some(2));
        let tracker = WorkspaceTracker::new(compositor.clone());
        let mut active = tracker.active();
        assert_eq!(tracker.current_view().active, Some(2));

        compositor.switch_workspace(Some(2));
        assert!(!active.has_changed().unwrap());

        compositor.switch_workspace(Some(7));
        assert!(active.has_changed().unwrap());
        assert_eq!(*active.borrow_and_update(), Some(7));
        assert_eq!(active_ids(&tracker.current_view()), vec![7]);
    }

    #[test]
    fn test_drop_disconnects() {
        let compositor = Rc::new(FakeCompositor::default());
        let tracker = WorkspaceTracker::new(compositor.clone());
        assert_eq!(compositor.workspace_changed.handler_count(), 1);
        drop(tracker);
        assert_eq!(compositor.workspace_changed.handler_count(), 0);
    }
}
