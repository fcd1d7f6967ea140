//! Publishes the title of the focused window.
//!
//! The tracker follows the compositor's focus and keeps exactly one title-changed handler attached,
//! to the window that currently has focus. Every focus change tears down the old subscription
//! before a new one is made, even when the same window regains focus.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use islandbar_shared_util::HandlerId;
use tokio::sync::watch;

use crate::compositor::{Compositor, Window};

/// A title-changed handler, together with the window it is attached to.
struct FocusSubscription {
    window: Rc<dyn Window>,
    handler: HandlerId,
}

enum FocusState {
    Unfocused,
    FocusedOn(FocusSubscription),
}

struct Inner {
    compositor: Rc<dyn Compositor>,
    state: RefCell<FocusState>,
    title: watch::Sender<String>,
}

impl Inner {
    fn transition(self: &Rc<Self>, target: Option<Rc<dyn Window>>) {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), FocusState::Unfocused);
        if let FocusState::FocusedOn(FocusSubscription { window, handler }) = previous {
            window.disconnect(handler);
        }

        let Some(window) = target else {
            self.publish(String::new());
            return;
        };

        self.publish(window.title().unwrap_or_default());
        let handler = {
            let inner = Rc::downgrade(self);
            window.connect_title_changed(Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.refresh_title();
                }
            }))
        };
        *self.state.borrow_mut() = FocusState::FocusedOn(FocusSubscription { window, handler });
    }

    /// Re-read the title of the tracked window.
    fn refresh_title(&self) {
        let title = match &*self.state.borrow() {
            FocusState::FocusedOn(subscription) => subscription.window.title().unwrap_or_default(),
            FocusState::Unfocused => String::new(),
        };
        self.publish(title);
    }

    fn publish(&self, title: String) {
        self.title.send_if_modified(|current| {
            if *current == title {
                false
            } else {
                *current = title;
                true
            }
        });
    }
}

pub struct FocusTracker {
    inner: Rc<Inner>,
    focus_handler: HandlerId,
}

impl FocusTracker {
    pub fn new(compositor: Rc<dyn Compositor>) -> Self {
        let inner = Rc::new(Inner {
            compositor: compositor.clone(),
            state: RefCell::new(FocusState::Unfocused),
            title: watch::Sender::new(String::new()),
        });

        let focus_handler = {
            let weak: Weak<Inner> = Rc::downgrade(&inner);
            compositor.connect_focused_window_changed(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let focused = inner.compositor.focused_window();
                    inner.transition(focused);
                }
            }))
        };
        inner.transition(compositor.focused_window());

        FocusTracker { inner, focus_handler }
    }

    pub fn title(&self) -> watch::Receiver<String> {
        self.inner.title.subscribe()
    }

    pub fn current_title(&self) -> String {
        self.inner.title.borrow().clone()
    }
}

impl Drop for FocusTracker {
    fn drop(&mut self) {
        self.inner.compositor.disconnect(self.focus_handler);
        let state = std::mem::replace(&mut *self.inner.state.borrow_mut(), FocusState::Unfocused);
        if let FocusState::FocusedOn(FocusSubscription { window, handler }) = state {
            window.disconnect(handler);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{test_util::*, *};

    #[test]
    fn test_initial_title_is_empty() {
        let compositor = Rc::new(FakeCompositor::default());
        let tracker = FocusTracker::new(compositor);
        assert_eq!(*tracker.title().borrow(), "");
    }

    #[test]
    fn test_initially_focused_window() {
        let compositor = Rc::new(FakeCompositor::default());
        let w1 = FakeWindow::new(Some("editor"));
        *compositor.focused.borrow_mut() = Some(w1.clone());
        let tracker = FocusTracker::new(compositor);
        assert_eq!(tracker.current_title(), "editor");
        assert_eq!(w1.title_changed.handler_count(), 1);
    }

    #[test]
    fn test_single_subscription_across_focus_sequence() {
        let compositor = Rc::new(FakeCompositor::default());
        let tracker = FocusTracker::new(compositor.clone());
        let w1 = FakeWindow::new(Some("one"));
        let w2 = FakeWindow::new(Some("two"));
        let w3 = FakeWindow::new(Some("three"));
        let live_handlers = || w1.title_changed.handler_count() + w2.title_changed.handler_count() + w3.title_changed.handler_count();

        compositor.focus(Some(&w1));
        assert_eq!(tracker.current_title(), "one");
        assert_eq!((w1.title_changed.handler_count(), live_handlers()), (1, 1));

        compositor.focus(Some(&w2));
        assert_eq!(tracker.current_title(), "two");
        assert_eq!((w2.title_changed.handler_count(), live_handlers()), (1, 1));

        compositor.focus(Some(&w1));
        assert_eq!(tracker.current_title(), "one");
        assert_eq!((w1.title_changed.handler_count(), live_handlers()), (1, 1));

        compositor.focus(None);
        assert_eq!(tracker.current_title(), "");
        assert_eq!(live_handlers(), 0);

        compositor.focus(Some(&w3));
        assert_eq!(tracker.current_title(), "three");
        assert_eq!((w3.title_changed.handler_count(), live_handlers()), (1, 1));
    }

    #[test]
    fn test_refocusing_same_window_keeps_one_handler() {
        let compositor = Rc::new(FakeCompositor::default());
        let _tracker = FocusTracker::new(compositor.clone());
        let w1 = FakeWindow::new(Some("one"));
        compositor.focus(Some(&w1));
        compositor.focus(Some(&w1));
        assert_eq!(w1.title_changed.handler_count(), 1);
    }

    #[test]
    fn test_title_changes_of_other_windows_are_ignored() {
        let compositor = Rc::new(FakeCompositor::default());
        let tracker = FocusTracker::new(compositor.clone());
        let w1 = FakeWindow::new(Some("one"));
        let w2 = FakeWindow::new(Some("two"));

        compositor.focus(Some(&w1));
        compositor.focus(Some(&w2));
        w1.set_title(Some("one, renamed"));
        assert_eq!(tracker.current_title(), "two");

        w2.set_title(Some("two, renamed"));
        assert_eq!(tracker.current_title(), "two, renamed");
    }

    #[test]
    fn test_missing_title_falls_back_to_empty() {
        let compositor = Rc::new(FakeCompositor::default());
        let tracker = FocusTracker::new(compositor.clone());
        let w1 = FakeWindow::new(None);
        compositor.focus(Some(&w1));
        assert_eq!(tracker.current_title(), "");

        w1.set_title(Some("loaded"));
        assert_eq!(tracker.current_title(), "loaded");
        w1.set_title(None);
        assert_eq!(tracker.current_title(), "");
    }

    #[test]
    fn test_title_receiver_sees_changes() {
        let compositor = Rc::new(FakeCompositor::default());
        let tracker = FocusTracker::new(compositor.clone());
        let mut title = tracker.title();
        assert!(!title.has_changed().unwrap());

        let w1 = FakeWindow::new(Some("one"));
        compositor.focus(Some(&w1));
        assert!(title.has_changed().unwrap());
        assert_eq!(*title.borrow_and_update(), "one");
    }

    #[test]
    fn test_drop_disconnects_everything() {
        let compositor = Rc::new(FakeCompositor::default());
        let tracker = FocusTracker::new(compositor.clone());
        let w1 = FakeWindow::new(Some("one"));
        compositor.focus(Some(&w1));
        assert_eq!(compositor.focus_changed.handler_count(), 1);

        drop(tracker);
        assert_eq!(compositor.focus_changed.handler_count(), 0);
        assert_eq!(w1.title_changed.handler_count(), 0);
    }
}
